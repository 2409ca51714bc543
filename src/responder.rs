use std::net::{Ipv4Addr, Ipv6Addr};

use anyhow::Result;
use lazy_static::lazy_static;
use log::{debug, info, warn};
use regex::Regex;

use crate::message::Message;
use crate::reply::Reply;
use crate::resource::ResourceType;
use crate::service::{Host, Service};
use crate::{DEFAULT_TTL, SERVICES_ENUMERATION};

/// Sends completed replies. Implemented by the multicast UDP transport that
/// owns the socket.
pub trait Transport {
    fn send(&mut self, reply: &Reply) -> Result<()>;
}

/// Supplies the host's current network addresses. The unspecified address
/// stands in when one is unavailable.
pub trait HostAddresses {
    fn ipv4(&self) -> Ipv4Addr;

    fn ipv6(&self) -> Ipv6Addr {
        Ipv6Addr::UNSPECIFIED
    }
}

/// Answers mDNS queries for the local host name and registered services.
///
/// The responder holds services by reference and never owns them; a service
/// must outlive its registration. All message handling is synchronous and
/// runs to completion inside [`Responder::on_message`].
pub struct Responder<'a> {
    hostname: String,
    services: Vec<&'a dyn Service>,
}

impl<'a> Responder<'a> {
    /// Creates a responder for a host name (without the ".local" suffix).
    pub fn new(hostname: impl Into<String>) -> Self {
        let hostname = hostname.into();
        info!("mDNS responder initialised for '{hostname}'");
        Self {
            hostname,
            services: vec![],
        }
    }

    fn same(a: &dyn Service, b: &dyn Service) -> bool {
        std::ptr::eq(a as *const dyn Service as *const (), b as *const dyn Service as *const ())
    }

    /// Registers a service. Refuses (returning false) a service instance that
    /// is already registered.
    pub fn add_service(&mut self, service: &'a dyn Service) -> bool {
        debug!("[mDNS] addService '{}'", service.instance_name());
        if self.services.iter().any(|s| Self::same(*s, service)) {
            warn!("[mDNS] service already registered");
            return false;
        }

        lazy_static! {
            static ref SERVICE_NAME: Regex =
                Regex::new("^[A-Za-z0-9]([A-Za-z0-9-]{0,13}[A-Za-z0-9])?$").unwrap();
        }
        if !SERVICE_NAME.is_match(&service.name()) {
            warn!(
                "[mDNS] service name '{}' is not a valid DNS-SD service name",
                service.name()
            );
        }

        self.services.push(service);
        true
    }

    /// Unregisters a service. Returns false if it was not registered.
    pub fn remove_service(&mut self, service: &'a dyn Service) -> bool {
        let before = self.services.len();
        self.services.retain(|s| !Self::same(*s, service));
        self.services.len() < before
    }

    /// Handles one inbound message, sending a separate reply for every
    /// question match through the transport.
    ///
    /// Always returns true so other DNS-aware consumers of the same socket
    /// keep seeing the message.
    pub fn on_message(
        &self,
        message: &Message,
        addresses: &dyn HostAddresses,
        transport: &mut dyn Transport,
    ) -> Result<bool> {
        if message.header.is_response || message.header.op_code != 0 {
            // not a standard query; pass to other handlers
            return Ok(true);
        }

        let host = Host::new(&self.hostname, addresses.ipv4(), addresses.ipv6());

        for question in message.questions() {
            let q_name = question.name();
            let q_type = question.q_type();

            if q_name.eq_str(&host.name_with_domain) {
                let mut reply = Reply::answer(message.header.id);
                match q_type {
                    ResourceType::A => {
                        reply.add_a(&host.name_with_domain, DEFAULT_TTL, host.ipv4)?;
                    }
                    ResourceType::Aaaa => {
                        reply.add_aaaa(&host.name_with_domain, DEFAULT_TTL, host.ipv6)?;
                    }
                    _ => {
                        debug!("[mDNS]   no match for {q_type} {q_name}");
                        continue;
                    }
                }
                transport.send(&reply)?;
                debug!("[mDNS]   >> responded to {q_type} {q_name}");
                continue;
            }

            if q_name.eq_str(SERVICES_ENUMERATION) {
                let mut reply = Reply::answer(message.header.id);
                // the first answer carries the full enumeration name; every
                // later answer compresses to a back-pointer at it
                for service in &self.services {
                    reply.add_ptr(SERVICES_ENUMERATION, DEFAULT_TTL, &service.service_name())?;
                }
                transport.send(&reply)?;
                debug!("[mDNS]   >> responded to {q_type} {q_name}");
                continue;
            }

            let mut handled = false;
            for service in &self.services {
                let mut reply = Reply::answer(message.header.id);
                if service.handle_question(question, &host, &mut reply)? {
                    transport.send(&reply)?;
                    debug!("[mDNS]   >> responded to {q_type} {q_name}");
                    handled = true;
                }
            }
            if !handled {
                debug!("[mDNS]   no match for {q_type} {q_name}");
            }
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::{HostAddresses, Responder, Transport};
    use crate::message::Message;
    use crate::reply::Reply;
    use crate::resource::ResourceType;
    use crate::service::{Protocol, Service};
    use anyhow::Result;
    use std::net::{Ipv4Addr, Ipv6Addr};

    struct Addresses;

    impl HostAddresses for Addresses {
        fn ipv4(&self) -> Ipv4Addr {
            Ipv4Addr::new(192, 168, 1, 5)
        }
    }

    /// Buffers sent replies for inspection.
    #[derive(Default)]
    struct Buffered {
        packets: Vec<Vec<u8>>,
    }

    impl Transport for Buffered {
        fn send(&mut self, reply: &Reply) -> Result<()> {
            self.packets.push(reply.packet().to_vec());
            Ok(())
        }
    }

    struct TestService {
        instance: &'static str,
        name: &'static str,
        protocol: Protocol,
        port: u16,
    }

    impl TestService {
        fn http() -> Self {
            Self {
                instance: "Sming",
                name: "http",
                protocol: Protocol::Tcp,
                port: 80,
            }
        }

        fn printer() -> Self {
            Self {
                instance: "Laser",
                name: "ipp",
                protocol: Protocol::Tcp,
                port: 631,
            }
        }
    }

    impl Service for TestService {
        fn instance(&self) -> String {
            self.instance.into()
        }

        fn name(&self) -> String {
            self.name.into()
        }

        fn protocol(&self) -> Protocol {
            self.protocol
        }

        fn port(&self) -> u16 {
            self.port
        }

        fn add_text(&self, reply: &mut Reply, txt: crate::reply::TxtRecordHandle) -> Result<()> {
            reply.add_txt_entry(txt, "version=1")?;
            Ok(())
        }
    }

    fn query(name: &str, q_type: ResourceType) -> Vec<u8> {
        let mut query = Reply::query(0);
        query.add_question(name, q_type).unwrap();
        query.packet().to_vec()
    }

    fn dispatch(responder: &Responder, packet: &[u8]) -> Vec<Vec<u8>> {
        let _ = env_logger::builder().is_test(true).try_init();
        let message = Message::parse(packet).unwrap();
        let mut transport = Buffered::default();
        let keep_going = responder
            .on_message(&message, &Addresses, &mut transport)
            .unwrap();
        assert!(keep_going);
        transport.packets
    }

    #[test]
    fn duplicate_registration_fails() {
        let service = TestService::http();
        let mut responder = Responder::new("pc");
        assert!(responder.add_service(&service));
        assert!(!responder.add_service(&service));
        assert!(responder.remove_service(&service));
        assert!(!responder.remove_service(&service));
        assert!(responder.add_service(&service));
    }

    #[test]
    fn host_address_question() {
        let responder = Responder::new("pc");
        let packets = dispatch(&responder, &query("pc.local", ResourceType::A));
        assert_eq!(packets.len(), 1);

        let reply = Message::parse(&packets[0]).unwrap();
        assert!(reply.header.is_response);
        assert_eq!(reply.header.answer_count, 1);
        let answer = &reply.answers()[0];
        assert_eq!(answer.name().decode().unwrap(), "pc.local");
        assert_eq!(
            answer.a().address().unwrap(),
            Ipv4Addr::new(192, 168, 1, 5)
        );
    }

    #[test]
    fn host_aaaa_question() {
        let responder = Responder::new("pc");
        let packets = dispatch(&responder, &query("pc.local", ResourceType::Aaaa));
        assert_eq!(packets.len(), 1);

        let reply = Message::parse(&packets[0]).unwrap();
        let answer = &reply.answers()[0];
        assert_eq!(answer.r_type(), ResourceType::Aaaa);
        assert_eq!(answer.aaaa().address().unwrap(), Ipv6Addr::UNSPECIFIED);
    }

    #[test]
    fn mismatched_host_name_yields_nothing() {
        let responder = Responder::new("pc");
        let packets = dispatch(&responder, &query("laptop.local", ResourceType::A));
        assert!(packets.is_empty());
    }

    #[test]
    fn wrong_type_for_host_name_yields_nothing() {
        let responder = Responder::new("pc");
        let packets = dispatch(&responder, &query("pc.local", ResourceType::Txt));
        assert!(packets.is_empty());
    }

    #[test]
    fn service_enumeration_compresses_repeated_names() {
        let http = TestService::http();
        let printer = TestService::printer();
        let mut responder = Responder::new("pc");
        responder.add_service(&http);
        responder.add_service(&printer);

        let packets = dispatch(
            &responder,
            &query("_services._dns-sd._udp.local", ResourceType::Ptr),
        );
        assert_eq!(packets.len(), 1);

        let reply = Message::parse(&packets[0]).unwrap();
        assert_eq!(reply.header.answer_count, 2);
        let names: Vec<String> = reply
            .answers()
            .iter()
            .map(|a| a.ptr().name().decode().unwrap())
            .collect();
        assert_eq!(names, vec!["_http._tcp.local", "_ipp._tcp.local"]);

        // answer one's name starts right after the header; answer two's name
        // is a two-byte pointer back at it
        let first = &reply.answers()[0];
        assert_eq!(first.name().offset(), 12);
        assert_eq!(first.name().data_length().unwrap(), 30);
        let second = &reply.answers()[1];
        assert_eq!(
            &packets[0][second.name().offset()..second.name().offset() + 2],
            &[0xC0, 0x0C]
        );
        assert_eq!(
            second.name().decode().unwrap(),
            "_services._dns-sd._udp.local"
        );
    }

    #[test]
    fn service_enumeration_without_services_is_empty() {
        let responder = Responder::new("pc");
        let packets = dispatch(
            &responder,
            &query("_services._dns-sd._udp.local", ResourceType::Ptr),
        );
        assert_eq!(packets.len(), 1);
        let reply = Message::parse(&packets[0]).unwrap();
        assert_eq!(reply.header.answer_count, 0);
    }

    #[test]
    fn service_type_question_yields_full_reply() {
        let http = TestService::http();
        let mut responder = Responder::new("pc");
        responder.add_service(&http);

        let packets = dispatch(&responder, &query("_http._tcp.local", ResourceType::Ptr));
        assert_eq!(packets.len(), 1);

        let reply = Message::parse(&packets[0]).unwrap();
        assert_eq!(reply.header.answer_count, 1);
        assert_eq!(reply.header.authority_count, 0);
        assert_eq!(reply.header.additional_count, 4);

        let ptr = &reply.answers()[0];
        assert_eq!(ptr.r_type(), ResourceType::Ptr);
        assert_eq!(ptr.name().decode().unwrap(), "_http._tcp.local");
        assert_eq!(
            ptr.ptr().name().decode().unwrap(),
            "Sming._http._tcp.local"
        );

        let additional = reply.additional();
        assert_eq!(additional[0].r_type(), ResourceType::Txt);
        assert_eq!(additional[0].txt().value("version").unwrap(), b"1");
        assert_eq!(additional[1].r_type(), ResourceType::Srv);
        assert_eq!(additional[2].r_type(), ResourceType::A);
        assert_eq!(additional[3].r_type(), ResourceType::Aaaa);

        let srv = additional[1].srv();
        assert_eq!(srv.port().unwrap(), 80);
        let srv_host = srv.host().unwrap().decode().unwrap();
        assert!(srv_host.ends_with(".local"), "srv host was {srv_host}");
        assert_eq!(srv_host, "pc.local");
        assert_eq!(
            additional[2].a().address().unwrap(),
            Ipv4Addr::new(192, 168, 1, 5)
        );
    }

    #[test]
    fn any_question_matches_like_ptr() {
        let http = TestService::http();
        let mut responder = Responder::new("pc");
        responder.add_service(&http);

        let packets = dispatch(&responder, &query("_http._tcp.local", ResourceType::Any));
        assert_eq!(packets.len(), 1);
        let reply = Message::parse(&packets[0]).unwrap();
        assert_eq!(reply.header.answer_count, 1);
        assert_eq!(reply.header.additional_count, 4);
    }

    #[test]
    fn each_matching_service_gets_its_own_reply() {
        // two instances of the same service type
        let first = TestService {
            instance: "One",
            ..TestService::http()
        };
        let second = TestService {
            instance: "Two",
            ..TestService::http()
        };
        let mut responder = Responder::new("pc");
        responder.add_service(&first);
        responder.add_service(&second);

        let packets = dispatch(&responder, &query("_http._tcp.local", ResourceType::Ptr));
        assert_eq!(packets.len(), 2);

        let instances: Vec<String> = packets
            .iter()
            .map(|p| {
                let reply = Message::parse(p).unwrap();
                reply.answers()[0].ptr().name().decode().unwrap()
            })
            .collect();
        assert_eq!(
            instances,
            vec!["One._http._tcp.local", "Two._http._tcp.local"]
        );
    }

    #[test]
    fn unmatched_question_yields_nothing() {
        let http = TestService::http();
        let mut responder = Responder::new("pc");
        responder.add_service(&http);

        let packets = dispatch(&responder, &query("_ftp._tcp.local", ResourceType::Ptr));
        assert!(packets.is_empty());
    }

    #[test]
    fn responses_are_passed_through_untouched() {
        let responder = Responder::new("pc");
        let mut packet = query("pc.local", ResourceType::A);
        packet[2] |= 0x80; // response bit
        let message = Message::parse(&packet).unwrap();
        let mut transport = Buffered::default();
        assert!(responder
            .on_message(&message, &Addresses, &mut transport)
            .unwrap());
        assert!(transport.packets.is_empty());
    }

    #[test]
    fn multiple_questions_in_one_message() {
        let http = TestService::http();
        let mut responder = Responder::new("pc");
        responder.add_service(&http);

        let mut query = Reply::query(0);
        query.add_question("pc.local", ResourceType::A).unwrap();
        query
            .add_question("Sming._http._tcp.local", ResourceType::Txt)
            .unwrap();
        let packet = query.packet().to_vec();

        let packets = dispatch(&responder, &packet);
        assert_eq!(packets.len(), 2);
        let first = Message::parse(&packets[0]).unwrap();
        assert_eq!(first.answers()[0].r_type(), ResourceType::A);
        let second = Message::parse(&packets[1]).unwrap();
        assert_eq!(second.answers()[0].r_type(), ResourceType::Txt);
    }
}
