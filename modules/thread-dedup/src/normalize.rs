//! Canonical forms used to decide whether two comments are duplicates.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use vk_client::{Attachment, BoardComment};

/// Zero-width characters, BOM, soft hyphen, bidi marks.
static RE_FORMAT_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\p{Cf}+").expect("static regex"));
/// Any whitespace run that contains no newline.
static RE_HORIZONTAL_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("static regex"));
static RE_SPACE_AROUND_NEWLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r" ?\n ?").expect("static regex"));

const ATTACHMENT_SEPARATOR: &str = "|";

pub fn normalize_text(raw: &str) -> String {
    let text = raw.replace('\u{00A0}', " ").to_lowercase();
    let text = RE_FORMAT_CHARS.replace_all(&text, "");
    let text = RE_HORIZONTAL_WS.replace_all(&text, " ");
    let text = RE_SPACE_AROUND_NEWLINE.replace_all(&text, "\n");
    text.trim().to_string()
}

/// Order-independent signature of an attachment list.
///
/// Empty when `ignore` is set or there is nothing attached. If any attachment
/// cannot be rendered the whole signature degrades to empty.
pub fn attachment_signature(attachments: &[Attachment], ignore: bool) -> String {
    if ignore || attachments.is_empty() {
        return String::new();
    }

    let tuples: Option<Vec<String>> = attachments.iter().map(attachment_tuple).collect();
    match tuples {
        Some(mut tuples) => {
            tuples.sort();
            tuples.join(ATTACHMENT_SEPARATOR)
        }
        None => {
            tracing::debug!(
                count = attachments.len(),
                "Unrenderable attachment, comparing without attachments"
            );
            String::new()
        }
    }
}

fn attachment_tuple(attachment: &Attachment) -> Option<String> {
    let Some(kind) = attachment.kind.as_deref() else {
        return Some("unknown:".to_string());
    };

    let owner = segment(attachment.owner_id.as_ref())?;
    let id = segment(attachment.id.as_ref())?;
    let sticker = segment(attachment.sticker_id.as_ref())?;
    let url = segment(attachment.url.as_ref())?;
    Some(format!("{kind}:{owner}:{id}:{sticker}:{url}"))
}

/// Render a scalar field; structured values have no stable rendering.
fn segment(value: Option<&Value>) -> Option<String> {
    match value {
        None | Some(Value::Null) => Some(String::new()),
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        Some(Value::Array(_)) | Some(Value::Object(_)) => None,
    }
}

/// What two comments must share to count as duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub author_id: i64,
    pub text: String,
    pub attachments: String,
}

impl Signature {
    pub fn of(comment: &BoardComment, ignore_attachments: bool) -> Self {
        Self {
            author_id: comment.from_id,
            text: normalize_text(&comment.text),
            attachments: attachment_signature(&comment.attachments, ignore_attachments),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn collapses_case_and_whitespace() {
        assert_eq!(normalize_text("  Hello\t\tWORLD  "), "hello world");
        assert_eq!(normalize_text("line one  \n   line two"), "line one\nline two");
        assert_eq!(normalize_text("a\u{00A0}\u{00A0}b"), "a b");
    }

    #[test]
    fn strips_zero_width_characters() {
        assert_eq!(normalize_text("he\u{200B}llo\u{FEFF}"), "hello");
        assert_eq!(normalize_text("\u{200D}hi\u{2060} there"), "hi there");
    }

    #[test]
    fn keeps_blank_lines_between_paragraphs() {
        assert_eq!(normalize_text("first\n \nsecond"), "first\n\nsecond");
    }

    #[test]
    fn normalization_is_idempotent() {
        let samples = [
            "",
            "   ",
            " \n \n ",
            "Hello \u{00A0}\n\t World\u{200B} ",
            "МНОГО   пробелов \r\n и\tтабов",
            "a \u{200B} \n b",
            "x\u{00A0}\n\u{00A0}y",
            "İstanbul ß ǅ",
        ];
        for sample in samples {
            let once = normalize_text(sample);
            assert_eq!(normalize_text(&once), once, "sample {sample:?}");
        }
    }

    #[test]
    fn empty_or_ignored_attachments_have_empty_signature() {
        let photo = Attachment::new("photo").with_owner_id(1).with_id(2);
        assert_eq!(attachment_signature(&[], false), "");
        assert_eq!(attachment_signature(&[photo], true), "");
    }

    #[test]
    fn attachment_signature_renders_tuples() {
        let list = [
            Attachment::new("sticker").with_sticker_id(9),
            Attachment::new("photo").with_owner_id(-5).with_id(77),
            Attachment::default(),
        ];
        assert_eq!(
            attachment_signature(&list, false),
            "photo:-5:77::|sticker:::9:|unknown:"
        );
    }

    #[test]
    fn attachment_signature_is_order_independent() {
        let a = Attachment::new("photo").with_owner_id(1).with_id(2);
        let b = Attachment::new("doc").with_owner_id("1").with_url("https://vk.com/doc1_3");
        let c = Attachment::new("sticker").with_sticker_id(55);

        let expected = attachment_signature(&[a.clone(), b.clone(), c.clone()], false);
        for permutation in [
            [a.clone(), c.clone(), b.clone()],
            [b.clone(), a.clone(), c.clone()],
            [b.clone(), c.clone(), a.clone()],
            [c.clone(), a.clone(), b.clone()],
            [c.clone(), b.clone(), a.clone()],
        ] {
            assert_eq!(attachment_signature(&permutation, false), expected);
        }
    }

    #[test]
    fn unrenderable_attachment_degrades_to_empty() {
        let broken = Attachment::new("photo").with_id(json!({"nested": true}));
        let fine = Attachment::new("photo").with_id(1);
        assert_eq!(attachment_signature(&[fine, broken], false), "");
    }

    #[test]
    fn signature_depends_on_author_text_and_attachments() {
        let base = BoardComment::new(1, 10, "Hi there");
        let same = BoardComment::new(2, 10, "  hi   THERE ");
        let other_author = BoardComment::new(3, 11, "hi there");
        let with_photo = BoardComment::new(4, 10, "hi there")
            .with_attachment(Attachment::new("photo").with_owner_id(1).with_id(1));

        assert_eq!(Signature::of(&base, false), Signature::of(&same, false));
        assert_ne!(Signature::of(&base, false), Signature::of(&other_author, false));
        assert_ne!(Signature::of(&base, false), Signature::of(&with_photo, false));
        assert_eq!(Signature::of(&base, true), Signature::of(&with_photo, true));
    }
}
