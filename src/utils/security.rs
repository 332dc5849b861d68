//! Header-safe handling of client supplied file names.

const FALLBACK_NAME: &str = "download";

/// Reduce a client-supplied name to a bare, printable file name.
///
/// Strips directory components, quotes, backslashes and control characters.
pub fn attachment_name(requested: &str) -> String {
    let last = requested
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = last
        .chars()
        .filter(|c| !c.is_control() && *c != '"')
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        FALLBACK_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// `Content-Disposition` value for downloading `name` as an attachment.
///
/// `filename` carries an ASCII approximation for old clients, `filename*`
/// the exact UTF-8 name (RFC 6266).
pub fn content_disposition(name: &str) -> String {
    let name = attachment_name(name);
    let ascii: String = name
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();

    if ascii == name {
        format!("attachment; filename=\"{name}\"")
    } else {
        format!(
            "attachment; filename=\"{ascii}\"; filename*=UTF-8''{}",
            urlencoding::encode(&name)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_plain_names() {
        assert_eq!(attachment_name("report.pdf"), "report.pdf");
        assert_eq!(attachment_name("my file.tar.gz"), "my file.tar.gz");
        assert_eq!(attachment_name(".gitignore"), ".gitignore");
    }

    #[test]
    fn strips_directories() {
        assert_eq!(attachment_name("../../etc/passwd"), "passwd");
        assert_eq!(attachment_name("C:\\Users\\me\\secret.txt"), "secret.txt");
    }

    #[test]
    fn strips_header_breaking_characters() {
        assert_eq!(attachment_name("a\"b.txt"), "ab.txt");
        assert_eq!(attachment_name("evil\r\nSet-Cookie: x.txt"), "evilSet-Cookie: x.txt");
        assert_eq!(attachment_name("file\0.txt"), "file.txt");
    }

    #[test]
    fn falls_back_when_nothing_is_left() {
        assert_eq!(attachment_name(""), "download");
        assert_eq!(attachment_name("dir/"), "download");
        assert_eq!(attachment_name(".."), "download");
        assert_eq!(attachment_name("\"\""), "download");
    }

    #[test]
    fn ascii_names_use_plain_filename() {
        assert_eq!(
            content_disposition("report.pdf"),
            "attachment; filename=\"report.pdf\""
        );
    }

    #[test]
    fn unicode_names_add_extended_filename() {
        assert_eq!(
            content_disposition("résumé.pdf"),
            "attachment; filename=\"r_sum_.pdf\"; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"
        );
    }
}
