//! The closed set of event names hooks may subscribe to.

/// Subscribes to every recognized event.
pub const WILDCARD: &str = "*";

/// A session was established.
pub const CONNECT: &str = "_CONNECT";
/// A session ended (read failure, EOF, or kill).
pub const DISCONNECT: &str = "_DISCONNECT";
/// A line is about to be written; the payload is the event's trailing text.
pub const SEND: &str = "_SEND";
/// A line was read; the raw text is the event's trailing text.
pub const RECV: &str = "_RECV";

/// Every name that can be dispatched, pseudo-events first.
pub const RECOGNIZED: &[&str] = &[
    CONNECT, DISCONNECT, SEND, RECV,
    // Commands
    "PING", "PONG", "ERROR", "JOIN", "PART", "QUIT", "NICK", "PRIVMSG", "NOTICE", "MODE", "KICK",
    "INVITE", "TOPIC", "KILL", "CAP",
    // Registration
    "001", "002", "003", "004", "005",
    // LUSERS
    "250", "251", "252", "253", "254", "255", "265", "266",
    // WHOIS / WHO / channel info
    "311", "312", "313", "314", "315", "317", "318", "319", "324", "329", "332", "333", "352",
    "353", "366",
    // MOTD
    "372", "375", "376", "422",
    // Nick problems
    "432", "433", "437",
    // SASL
    "900", "903", "904",
];

/// Whether `name` is a dispatchable event (the wildcard is not).
pub fn is_recognized(name: &str) -> bool {
    RECOGNIZED.contains(&name)
}

/// Whether `name` may be used when registering a hook.
pub fn is_subscribable(name: &str) -> bool {
    name == WILDCARD || is_recognized(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recognized_names() {
        assert!(is_recognized("PRIVMSG"));
        assert!(is_recognized("001"));
        assert!(is_recognized(CONNECT));
        assert!(!is_recognized("WALLOPS"));
        assert!(!is_recognized(WILDCARD));
        assert!(is_subscribable(WILDCARD));
    }

    #[test]
    fn test_no_duplicates() {
        let unique: std::collections::HashSet<_> = RECOGNIZED.iter().collect();
        assert_eq!(unique.len(), RECOGNIZED.len());
    }
}
