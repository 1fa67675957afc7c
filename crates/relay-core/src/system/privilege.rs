use nix::unistd::{Uid, User};
use tracing::{debug, warn};

/// Effective user the process is running as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoker {
    pub uid: u32,
    pub name: Option<String>,
}

impl Invoker {
    pub fn is_root(&self) -> bool {
        self.uid == 0
    }
}

/// Look up the effective user. The name is `None` when it has no passwd entry.
pub fn current_invoker() -> Invoker {
    let uid = Uid::effective();
    let name = User::from_uid(uid).ok().flatten().map(|u| u.name);
    Invoker {
        uid: uid.as_raw(),
        name,
    }
}

/// Warn when the run is not privileged.
///
/// Nothing is escalated here; writes under /etc/postfix, chown and the
/// restart will simply fail later without root. Returns whether the
/// invoker is root.
pub fn preflight() -> bool {
    let invoker = current_invoker();
    if invoker.is_root() {
        debug!("Running as root");
        return true;
    }
    warn!(
        uid = invoker.uid,
        user = invoker.name.as_deref().unwrap_or("unknown"),
        "Not running as root; writing Postfix files and changing ownership will likely fail"
    );
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_invoker_matches_euid() {
        let invoker = current_invoker();
        assert_eq!(invoker.uid, Uid::effective().as_raw());
        assert_eq!(invoker.is_root(), Uid::effective().is_root());
    }

    #[test]
    fn test_preflight_agrees_with_invoker() {
        assert_eq!(preflight(), current_invoker().is_root());
    }

    #[test]
    fn test_is_root() {
        let root = Invoker { uid: 0, name: Some("root".into()) };
        let user = Invoker { uid: 1000, name: None };
        assert!(root.is_root());
        assert!(!user.is_root());
    }
}
