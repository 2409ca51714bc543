use std::fmt::Display;
use std::net::{Ipv4Addr, Ipv6Addr};

use anyhow::Result;

use crate::message::Question;
use crate::reply::{Reply, TxtRecordHandle};
use crate::resource::ResourceType;
use crate::{DEFAULT_TTL, DOT_LOCAL};

/// The transport protocol a service is reached over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Udp,
    Tcp,
}

impl Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Udp => write!(f, "_udp"),
            Protocol::Tcp => write!(f, "_tcp"),
        }
    }
}

/// The local host as seen for one incoming message.
///
/// Computed once per message and passed through the matching logic; never
/// persisted.
pub struct Host {
    pub name: String,
    pub name_with_domain: String,
    pub ipv4: Ipv4Addr,
    pub ipv6: Ipv6Addr,
}

impl Host {
    pub fn new(name: &str, ipv4: Ipv4Addr, ipv6: Ipv6Addr) -> Self {
        Self {
            name: name.to_owned(),
            name_with_domain: format!("{name}{DOT_LOCAL}"),
            ipv4,
            ipv6,
        }
    }
}

/// An advertised service.
///
/// Implementations supply the instance name, service type, protocol and port;
/// the provided methods derive the DNS-SD names and build replies for
/// matching questions. The responder holds services by reference and never
/// owns them.
pub trait Service {
    /// User-facing name of this service instance, e.g. "Sming".
    fn instance(&self) -> String;

    /// Identifies what the service does, e.g. "http".
    fn name(&self) -> String;

    /// Which protocol the service uses.
    fn protocol(&self) -> Protocol;

    /// Which port to reach the service on.
    fn port(&self) -> u16;

    /// Override to contribute TXT entries, e.g. key=value pairs.
    ///
    /// Called whenever a TXT reply is being built.
    fn add_text(&self, _reply: &mut Reply, _txt: TxtRecordHandle) -> Result<()> {
        Ok(())
    }

    /// Advertised service type name, e.g. "_http._tcp.local".
    fn service_name(&self) -> String {
        format!("_{}.{}{}", self.name(), self.protocol(), DOT_LOCAL)
    }

    /// Advertised instance name, e.g. "Sming._http._tcp.local".
    fn instance_name(&self) -> String {
        format!("{}.{}", self.instance(), self.service_name())
    }

    /// Offers a question to this service.
    ///
    /// Returns false (leaving the reply untouched) if the question does not
    /// concern this service; otherwise appends the records answering it and
    /// returns true. The reply cursor starts in the Answer section.
    fn handle_question(&self, question: &Question, host: &Host, reply: &mut Reply) -> Result<bool> {
        match question.q_type() {
            ResourceType::Any | ResourceType::Ptr => {
                let service_name = self.service_name();
                if !question.name().eq_str(&service_name) {
                    return Ok(false);
                }

                let instance_name = self.instance_name();
                let ptr = reply.add_ptr(&service_name, DEFAULT_TTL, &instance_name)?;
                // the instance name's encoding ends in a back-reference into
                // the service name just written; aim it at the name's start
                if let Some(instance) = ptr.rdata_name() {
                    if instance.ends_in_pointer() {
                        reply.fixup(instance, ptr.name().offset() as u16)?;
                    }
                }

                reply.next_section()?;
                reply.next_section()?;

                let txt = reply.add_txt(&instance_name, DEFAULT_TTL)?;
                self.add_text(reply, txt)?;

                let srv = reply.add_srv(
                    &instance_name,
                    DEFAULT_TTL,
                    0,
                    0,
                    self.port(),
                    &host.name_with_domain,
                )?;
                // the SRV host shares its domain with the service name
                if let (Some(host_name), Some(domain)) =
                    (srv.rdata_name(), reply.offset_of("local"))
                {
                    if host_name.ends_in_pointer() {
                        reply.fixup(host_name, domain)?;
                    }
                }

                reply.add_a(&host.name_with_domain, DEFAULT_TTL, host.ipv4)?;
                reply.add_aaaa(&host.name_with_domain, DEFAULT_TTL, host.ipv6)?;
            }

            ResourceType::Srv => {
                let instance_name = self.instance_name();
                if !question.name().eq_str(&instance_name) {
                    return Ok(false);
                }

                reply.add_srv(
                    &instance_name,
                    DEFAULT_TTL,
                    0,
                    0,
                    self.port(),
                    &host.name_with_domain,
                )?;

                reply.next_section()?;
                reply.next_section()?;

                reply.add_a(&host.name_with_domain, DEFAULT_TTL, host.ipv4)?;
                reply.add_aaaa(&host.name_with_domain, DEFAULT_TTL, host.ipv6)?;
            }

            ResourceType::Txt => {
                let instance_name = self.instance_name();
                if !question.name().eq_str(&instance_name) {
                    return Ok(false);
                }

                let txt = reply.add_txt(&instance_name, DEFAULT_TTL)?;
                self.add_text(reply, txt)?;
            }

            ResourceType::A => {
                if !question.name().eq_str(&host.name_with_domain) {
                    return Ok(false);
                }
                reply.add_a(&host.name_with_domain, DEFAULT_TTL, host.ipv4)?;
            }

            ResourceType::Aaaa => {
                if !question.name().eq_str(&host.name_with_domain) {
                    return Ok(false);
                }
                reply.add_aaaa(&host.name_with_domain, DEFAULT_TTL, host.ipv6)?;
            }

            _ => return Ok(false),
        }

        Ok(true)
    }
}
