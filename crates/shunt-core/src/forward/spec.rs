//! Port forward specification parsing.
//!
//! Grammar per entry: `[bind_address:]port:host:hostport`, where the bind
//! address and target host are runs of non-colon characters and both ports
//! are 1-5 ASCII digits. An entry not matching the grammar is a parse
//! failure; failures are aggregated across the whole set rather than
//! reported one at a time.

use std::fmt;

/// Direction of a port forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardDirection {
    /// Listen near the client (-L), connect out from the server side.
    Local,
    /// Listen on the server (-R), connect out from the client side.
    Remote,
}

impl fmt::Display for ForwardDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForwardDirection::Local => write!(f, "Local"),
            ForwardDirection::Remote => write!(f, "Remote"),
        }
    }
}

/// A validated, not-yet-materialized description of a forward.
///
/// Intents are created immutably by the parser and survive reconnects: the
/// supervisor builds a live forward from each intent once per connection
/// attempt, so the same set materializes again after a reconnect.
///
/// An empty `bound_host` means "all interfaces". Ports keep the parser's
/// 1-5 digit range (up to 99999); the 16-bit range is enforced when a live
/// forward is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardIntent {
    direction: ForwardDirection,
    bound_host: String,
    bound_port: u32,
    target_host: String,
    target_port: u32,
}

impl ForwardIntent {
    pub fn direction(&self) -> ForwardDirection {
        self.direction
    }

    pub fn bound_host(&self) -> &str {
        &self.bound_host
    }

    pub fn bound_port(&self) -> u32 {
        self.bound_port
    }

    pub fn target_host(&self) -> &str {
        &self.target_host
    }

    pub fn target_port(&self) -> u32 {
        self.target_port
    }

    /// Parse one forwarding entry, tagging it with the given direction.
    fn parse(direction: ForwardDirection, entry: &str) -> Option<Self> {
        let parts: Vec<&str> = entry.split(':').collect();

        let (bound_host, bound_port, target_host, target_port) = match parts.as_slice() {
            // port:host:hostport
            [bound_port, target_host, target_port] => {
                ("", *bound_port, *target_host, *target_port)
            }
            // bind_address:port:host:hostport
            [bound_host, bound_port, target_host, target_port] if !bound_host.is_empty() => {
                (*bound_host, *bound_port, *target_host, *target_port)
            }
            _ => return None,
        };

        if target_host.is_empty() {
            return None;
        }

        Some(Self {
            direction,
            bound_host: bound_host.to_string(),
            bound_port: parse_port(bound_port)?,
            target_host: target_host.to_string(),
            target_port: parse_port(target_port)?,
        })
    }
}

impl fmt::Display for ForwardIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bound_host.is_empty() {
            write!(
                f,
                "{} {} => {}:{}",
                self.direction, self.bound_port, self.target_host, self.target_port
            )
        } else {
            write!(
                f,
                "{} {}:{} => {}:{}",
                self.direction,
                self.bound_host,
                self.bound_port,
                self.target_host,
                self.target_port
            )
        }
    }
}

/// Parse a port token: 1-5 ASCII digits, no sign, no whitespace.
fn parse_port(s: &str) -> Option<u32> {
    if s.is_empty() || s.len() > 5 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // At most five digits, so this cannot overflow u32.
    s.parse().ok()
}

/// An ordered collection of forward intents.
///
/// Remote intents come first, then local intents, each group in its original
/// input order. A `ForwardSet` is either fully valid or rejected as a whole:
/// any malformed entry fails the entire parse with one message per offender.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardSet {
    intents: Vec<ForwardIntent>,
}

impl ForwardSet {
    /// Parse remote (-R) and local (-L) forwarding entries into a set.
    ///
    /// On failure, returns one `unable to parse port forward '<entry>'`
    /// message per malformed entry; no partial set is ever produced. The
    /// parse is pure: identical input always yields an identical set.
    pub fn parse(
        remote_specs: &[String],
        local_specs: &[String],
    ) -> std::result::Result<Self, Vec<String>> {
        let mut intents = Vec::with_capacity(remote_specs.len() + local_specs.len());
        let mut errors = Vec::new();

        let groups = [
            (ForwardDirection::Remote, remote_specs),
            (ForwardDirection::Local, local_specs),
        ];
        for (direction, specs) in groups {
            for entry in specs {
                match ForwardIntent::parse(direction, entry) {
                    Some(intent) => intents.push(intent),
                    None => errors.push(format!("unable to parse port forward '{entry}'")),
                }
            }
        }

        if errors.is_empty() {
            Ok(Self { intents })
        } else {
            Err(errors)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ForwardIntent> {
        self.intents.iter()
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }
}

impl<'a> IntoIterator for &'a ForwardSet {
    type Item = &'a ForwardIntent;
    type IntoIter = std::slice::Iter<'a, ForwardIntent>;

    fn into_iter(self) -> Self::IntoIter {
        self.intents.iter()
    }
}
