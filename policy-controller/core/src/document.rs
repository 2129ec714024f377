use std::{fmt, str::FromStr};

/// A rule document targeting a single namespace.
///
/// The content is a pure function of the declaration and the target namespace, so two
/// compilations of the same declaration compare equal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompiledDocument {
    pub namespace: String,
    pub name: String,
    pub ingress: Vec<Rule>,
    pub egress: Vec<Rule>,
}

/// One ingress or egress entry. Empty `peers` and empty `ports` each mean "any".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Rule {
    pub peers: Vec<Peer>,
    pub ports: Vec<PortMatch>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Peer {
    /// Matches the namespace with exactly this name.
    Namespace(String),

    /// Matches every namespace not named in the list.
    NamespaceNotIn(Vec<String>),

    /// Matches any address.
    Any,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PortMatch {
    pub port: u16,
    pub protocol: Protocol,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
    Sctp,
}

#[derive(Debug, thiserror::Error)]
#[error("unsupported protocol: {0:?}")]
pub struct UnsupportedProtocol(String);

/// Returns the name of the document derived from the named generator.
pub fn document_name(generator: &str) -> String {
    format!("{generator}-generated")
}

// === impl Rule ===

impl Rule {
    pub(crate) fn peers(peers: Vec<Peer>) -> Self {
        Self {
            peers,
            ports: vec![],
        }
    }

    pub(crate) fn any_peer_on(port: PortMatch) -> Self {
        Self {
            peers: vec![Peer::Any],
            ports: vec![port],
        }
    }
}

// === impl Protocol ===

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
            Self::Sctp => "SCTP",
        }
    }
}

impl FromStr for Protocol {
    type Err = UnsupportedProtocol;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "TCP" => Ok(Self::Tcp),
            "UDP" => Ok(Self::Udp),
            "SCTP" => Ok(Self::Sctp),
            _ => Err(UnsupportedProtocol(s.to_string())),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
