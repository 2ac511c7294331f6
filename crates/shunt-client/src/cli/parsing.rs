//! CLI parsing functions and methods.

use super::types::{Cli, ServiceAction};

impl Cli {
    /// Parse the destination into user and host components.
    ///
    /// Supports `user@host` and `host`; the user is optional.
    pub fn parse_destination(&self) -> Option<(Option<&str>, &str)> {
        let dest = self.destination.as_deref()?;
        Some(split_destination(dest))
    }

    /// Get the host from the destination.
    pub fn host(&self) -> Option<&str> {
        self.parse_destination().map(|(_, host)| host)
    }

    /// Get the user from the destination, if one was given.
    pub fn user(&self) -> Option<&str> {
        self.parse_destination().and_then(|(user, _)| user)
    }

    /// The service-control operation requested, if any.
    pub fn service_action(&self) -> Option<ServiceAction> {
        if self.install_service {
            Some(ServiceAction::Install)
        } else if self.uninstall_service {
            Some(ServiceAction::Uninstall)
        } else if self.start_service {
            Some(ServiceAction::Start)
        } else if self.stop_service {
            Some(ServiceAction::Stop)
        } else {
            None
        }
    }
}

/// Split `[user@]host`, treating an empty user or host part as no split.
pub fn split_destination(dest: &str) -> (Option<&str>, &str) {
    match dest.split_once('@') {
        Some((user, host)) if !user.is_empty() && !host.is_empty() => (Some(user), host),
        _ => (None, dest),
    }
}
