//! Ref-name validation, following `git check-ref-format`'s rules as restated
//! by the spec this core implements: no implicit normalisation, reject
//! anything dubious rather than trying to repair it.

/// Returns `Ok(())` if `name` is an acceptable ref name, `Err(reason)`
/// otherwise.
pub fn validate_ref_name(name: &str) -> Result<(), String> {
    if name == "HEAD" {
        return Ok(());
    }

    if !name.starts_with("refs/") {
        return Err(format!("`{name}` lacks the `refs/` prefix"));
    }

    if name.contains("..") {
        return Err("ref name contains `..`".to_string());
    }
    if name.contains("//") {
        return Err("ref name contains consecutive `//`".to_string());
    }
    if name.contains("@{") {
        return Err("ref name contains `@{`".to_string());
    }
    for b in name.bytes() {
        if b == b'\\' {
            return Err("ref name contains a backslash".to_string());
        }
        if b < 0o40 || b == 0x7f {
            return Err("ref name contains a control byte".to_string());
        }
        if matches!(
            b,
            b' ' | b'~' | b'^' | b':' | b'?' | b'*' | b'['
        ) {
            return Err(format!("ref name contains disallowed byte `{}`", b as char));
        }
    }

    if name.ends_with('/') || name.ends_with('.') {
        return Err("ref name ends with `/` or `.`".to_string());
    }

    for component in name.split('/') {
        if component.is_empty() {
            return Err("ref name has an empty path component".to_string());
        }
        if component == "@" {
            return Err("ref name has a path component equal to `@`".to_string());
        }
        if component.starts_with('.') {
            return Err("ref name has a path component starting with `.`".to_string());
        }
        if component.ends_with(".lock") {
            return Err("ref name has a path component ending in `.lock`".to_string());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_head_and_ordinary_branch_refs() {
        assert!(validate_ref_name("HEAD").is_ok());
        assert!(validate_ref_name("refs/heads/main").is_ok());
        assert!(validate_ref_name("refs/heads/feature/sub").is_ok());
    }

    #[test]
    fn accepts_a_40_hex_name_as_a_valid_ref() {
        assert!(validate_ref_name("refs/heads/8ab686eafeb1f44702738c8b0f24f2567c36da6d").is_ok());
    }

    #[test]
    fn rejects_missing_prefix() {
        assert!(validate_ref_name("main").is_err());
    }

    #[test]
    fn rejects_double_dot_and_double_slash() {
        assert!(validate_ref_name("refs/heads/../main").is_err());
        assert!(validate_ref_name("refs/heads//main").is_err());
    }

    #[test]
    fn rejects_trailing_slash_or_dot() {
        assert!(validate_ref_name("refs/heads/main/").is_err());
        assert!(validate_ref_name("refs/heads/main.").is_err());
    }

    #[test]
    fn rejects_dotlock_suffix_and_at_component() {
        assert!(validate_ref_name("refs/heads/main.lock").is_err());
        assert!(validate_ref_name("refs/heads/@").is_err());
    }

    #[test]
    fn rejects_reserved_characters() {
        for bad in ["refs/heads/a b", "refs/heads/a~b", "refs/heads/a^b", "refs/heads/a:b",
                    "refs/heads/a?b", "refs/heads/a*b", "refs/heads/a[b"] {
            assert!(validate_ref_name(bad).is_err(), "{bad} should be rejected");
        }
    }
}
