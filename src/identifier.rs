//! Short random filename generation.
//!
//! Grounded on `examples/original_source/server/fileid.go`
//! (`GenerateNewFileID`), with the RNG source upgraded from Go's
//! `math/rand` to the specification's required CSPRNG (§6: "source draws
//! from a cryptographic RNG"). Uniqueness is not guaranteed here; callers
//! (the registry's `prepare_upload`) retry on collision.

use rand::RngCore;

/// Generates a random base-36 token from 64 random bits, e.g. `"3o8xf1q2k9z7r"`.
pub fn generate() -> String {
    let bits = rand::rngs::OsRng.next_u64();
    to_base36(bits)
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut buf = Vec::with_capacity(13);
    while value > 0 {
        buf.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    buf.reverse();
    String::from_utf8(buf).expect("base-36 digits are ASCII")
}

/// Builds the filename for a minted reservation: the random token, plus
/// `"." + extension` when `extension` is non-empty.
pub fn generate_file_name(extension: &str) -> String {
    let token = generate();
    if extension.is_empty() {
        token
    } else {
        format!("{token}.{extension}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base36_roundtrips_digits() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[test]
    fn file_name_appends_extension_only_when_present() {
        let bare = generate_file_name("");
        assert!(!bare.contains('.'));

        let with_ext = generate_file_name("png");
        assert!(with_ext.ends_with(".png"));
        assert_eq!(with_ext.matches('.').count(), 1);
    }

    #[test]
    fn generated_names_are_lowercase_alnum() {
        for _ in 0..20 {
            let name = generate();
            assert!(name.chars().all(|c| c.is_ascii_alphanumeric() && !c.is_ascii_uppercase()));
        }
    }
}
