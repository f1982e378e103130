//! Text and file-name sanitizers for user-supplied upload fields.

use uuid::Uuid;

const MAX_FILE_NAME_LEN: usize = 120;

/// Remove HTML tags from `input`, dropping `<script>` and `<style>` blocks
/// together with their contents, then trim surrounding whitespace.
pub fn strip_all_tags(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let lower = input.to_ascii_lowercase();
    let mut i = 0;

    while i < input.len() {
        let rest = &input[i..];
        if !rest.starts_with('<') {
            let next = rest.find('<').map_or(input.len(), |pos| i + pos);
            out.push_str(&input[i..next]);
            i = next;
            continue;
        }

        let lower_rest = &lower[i..];
        let skipped_block = ["script", "style"].iter().find_map(|tag| {
            let open = format!("<{}", tag);
            if !lower_rest.starts_with(&open) {
                return None;
            }
            let boundary = lower_rest[open.len()..].chars().next();
            if !matches!(boundary, Some('>' | '/' | ' ' | '\t' | '\r' | '\n')) {
                return None;
            }
            let close = format!("</{}", tag);
            Some(match lower_rest.find(&close) {
                Some(pos) => {
                    let after_close = i + pos;
                    lower[after_close..]
                        .find('>')
                        .map_or(input.len(), |end| after_close + end + 1)
                }
                None => input.len(),
            })
        });

        i = match skipped_block {
            Some(end) => end,
            None => rest.find('>').map_or(input.len(), |end| i + end + 1),
        };
    }

    out.trim().to_string()
}

/// Reduce a client-supplied file name to a safe single path component.
///
/// Only the final component is kept, characters outside `[A-Za-z0-9._-]`
/// become `_`, leading dots are dropped and the result is capped in length.
/// Falls back to `upload` when nothing usable remains.
pub fn sanitize_file_name(original: &str) -> String {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_start_matches('.');
    let capped: String = if trimmed.len() > MAX_FILE_NAME_LEN {
        // keep the extension when truncating
        match trimmed.rfind('.') {
            Some(dot) if trimmed.len() - dot <= 16 => {
                let ext = &trimmed[dot..];
                format!("{}{}", &trimmed[..MAX_FILE_NAME_LEN - ext.len()], ext)
            }
            _ => trimmed[..MAX_FILE_NAME_LEN].to_string(),
        }
    } else {
        trimmed.to_string()
    };

    if capped.is_empty() {
        "upload".to_string()
    } else {
        capped
    }
}

/// Unique staging file name: `<uuid>-<sanitized original name>`.
pub fn staging_file_name(original: &str) -> String {
    format!("{}-{}", Uuid::new_v4(), sanitize_file_name(original))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_trims() {
        assert_eq!(strip_all_tags("  <b>Hello</b> <i>world</i> "), "Hello world");
        assert_eq!(strip_all_tags("no tags"), "no tags");
    }

    #[test]
    fn drops_script_and_style_contents() {
        assert_eq!(
            strip_all_tags("a<script type=\"x\">alert(1)</script>b<STYLE>p{}</STYLE>c"),
            "abc"
        );
    }

    #[test]
    fn keeps_text_after_unterminated_tag_out() {
        assert_eq!(strip_all_tags("title <unterminated"), "title");
        assert_eq!(strip_all_tags("<scripted>x</scripted>"), "x");
    }

    #[test]
    fn file_name_cannot_escape_staging_dir() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("..\\..\\boot.ini"), "boot.ini");
        assert_eq!(sanitize_file_name(".."), "upload");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
    }

    #[test]
    fn file_name_replaces_unsafe_characters() {
        assert_eq!(sanitize_file_name("my clip (final).mp4"), "my_clip__final_.mp4");
        assert_eq!(sanitize_file_name(""), "upload");
    }

    #[test]
    fn long_file_names_keep_extension() {
        let long = format!("{}.mp4", "a".repeat(300));
        let name = sanitize_file_name(&long);
        assert_eq!(name.len(), MAX_FILE_NAME_LEN);
        assert!(name.ends_with(".mp4"));
    }

    #[test]
    fn staging_names_are_unique_for_same_input() {
        let a = staging_file_name("clip.mp4");
        let b = staging_file_name("clip.mp4");
        assert_ne!(a, b);
        assert!(a.ends_with("-clip.mp4"));
    }
}
