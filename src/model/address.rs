//! Mailbox extraction from address headers (RFC 5322 §3.4).

/// The bare address of a mailbox taken from an address header.
///
/// # Examples
/// - `"Jana Nováková <jana@example.org>"` → `address = "jana@example.org"`
/// - `"list-request@example.org"` → `address = "list-request@example.org"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    /// `user@domain`
    pub address: String,
}

impl EmailAddress {
    /// Parse a single mailbox from a header value.
    ///
    /// Supported formats:
    /// - `"user@domain.com"`
    /// - `"<user@domain.com>"`
    /// - `"Display Name <user@domain.com>"`
    /// - `"\"Display, Name\" <user@domain.com>"`
    ///
    /// Returns `None` when no `user@domain` can be found.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();

        if let (Some(start), Some(end)) = (trimmed.rfind('<'), trimmed.rfind('>')) {
            if end > start {
                let address = trimmed[start + 1..end].trim();
                if address.contains('@') {
                    return Some(Self {
                        address: address.to_string(),
                    });
                }
                return None;
            }
        }

        if trimmed.contains('@') && !trimmed.contains(char::is_whitespace) {
            return Some(Self {
                address: trimmed.to_string(),
            });
        }

        None
    }

    /// First parseable mailbox of a comma-separated list.
    ///
    /// Handles quoted commas: `"Last, First" <a@b.com>, other@c.com`
    pub fn first_of_list(raw: &str) -> Option<Self> {
        let mut current = String::new();
        let mut in_quotes = false;
        let mut in_angle = false;

        for ch in raw.chars() {
            match ch {
                '"' => in_quotes = !in_quotes,
                '<' if !in_quotes => in_angle = true,
                '>' if !in_quotes => in_angle = false,
                ',' if !in_quotes && !in_angle => {
                    if let Some(addr) = Self::parse(&current) {
                        return Some(addr);
                    }
                    current.clear();
                    continue;
                }
                _ => {}
            }
            current.push(ch);
        }

        Self::parse(&current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bare_address() {
        let addr = EmailAddress::parse("user@example.com").unwrap();
        assert_eq!(addr.address, "user@example.com");
    }

    #[test]
    fn test_parse_name_and_address() {
        let addr = EmailAddress::parse("User One <user1@example.com>").unwrap();
        assert_eq!(addr.address, "user1@example.com");
    }

    #[test]
    fn test_parse_encoded_name_keeps_address() {
        let addr = EmailAddress::parse("=?UTF-8?Q?Jana_Nov=C3=A1kov=C3=A1?= <jana@example.org>")
            .unwrap();
        assert_eq!(addr.address, "jana@example.org");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(EmailAddress::parse("").is_none());
        assert!(EmailAddress::parse("undisclosed recipients").is_none());
        assert!(EmailAddress::parse("Someone <nobody>").is_none());
    }

    #[test]
    fn test_first_of_list_with_quoted_comma() {
        let addr = EmailAddress::first_of_list("\"Last, First\" <a@b.com>, other@c.com").unwrap();
        assert_eq!(addr.address, "a@b.com");
    }

    #[test]
    fn test_first_of_list_skips_unparseable() {
        let addr = EmailAddress::first_of_list("nobody, second@c.com").unwrap();
        assert_eq!(addr.address, "second@c.com");
    }
}
