use tracing::warn;

/// Interpret a string value such as "1" or "no" as a boolean.
///
/// Returns `None` for unrecognized values.
pub fn str_as_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

/// Return whether a feature flag controlled by an environment variable is
/// enabled.
///
/// Unset variables and unrecognized values yield `default`.
pub fn env_flag(name: &str, default: bool) -> bool {
    let Ok(val) = std::env::var(name) else {
        return default;
    };
    str_as_bool(&val).unwrap_or_else(|| {
        warn!(var = name, value = %val, "unrecognized boolean value");
        default
    })
}

#[cfg(test)]
mod tests {
    use opschema_testing::TestCases;

    use super::{env_flag, str_as_bool};

    #[test]
    fn test_str_as_bool() {
        #[derive(Debug)]
        struct Case {
            value: &'static str,
            expected: Option<bool>,
        }

        let cases = [
            Case {
                value: "1",
                expected: Some(true),
            },
            Case {
                value: "Yes",
                expected: Some(true),
            },
            Case {
                value: " off ",
                expected: Some(false),
            },
            Case {
                value: "no",
                expected: Some(false),
            },
            Case {
                value: "maybe",
                expected: None,
            },
        ];

        cases.test_each(|case| assert_eq!(str_as_bool(case.value), case.expected));
    }

    #[test]
    fn test_env_flag_unset_uses_default() {
        assert!(env_flag("OPSCHEMA_TEST_FLAG_THAT_IS_NEVER_SET", true));
        assert!(!env_flag("OPSCHEMA_TEST_FLAG_THAT_IS_NEVER_SET", false));
    }
}
