//! Reduce Moodle HTML to plain text blocks.
//!
//! Moodle stores glossary definitions, wiki pages and database fields as
//! HTML fragments written by an editor. The PDF writer only needs paragraphs,
//! list items, inline headings and images, so everything else is stripped.

use once_cell::sync::Lazy;
use regex::Regex;

use super::pdf::{Block, ImageBlock};

static COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex"));

static SCRIPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<(?:script|style)\b.*?</(?:script|style)\s*>").expect("valid script regex")
});

static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(src|width|height)\s*=\s*["']([^"']*)["']"#).expect("valid attribute regex")
});

static TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<(/?)([a-zA-Z][a-zA-Z0-9]*)\b[^>]*>").expect("valid tag regex"));

static ENTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z][a-zA-Z0-9]*);")
        .expect("valid entity regex")
});

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid space regex"));

/// What the text collected so far will become when it is flushed.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Pending {
    Paragraph,
    Bullet,
    Heading,
}

/// Convert an HTML fragment into layout blocks, in document order.
pub fn html_to_blocks(html: &str) -> Vec<Block> {
    let text = COMMENT.replace_all(html, "");
    let text = SCRIPT.replace_all(&text, "");

    let mut blocks = Vec::new();
    let mut current = String::new();
    let mut pending = Pending::Paragraph;
    let mut last = 0;

    for caps in TAG.captures_iter(&text) {
        let Some(whole) = caps.get(0) else { continue };
        current.push_str(&text[last..whole.start()]);
        last = whole.end();

        let closing = &caps[1] == "/";
        let name = caps[2].to_ascii_lowercase();
        match name.as_str() {
            "br" => current.push(' '),
            "img" => {
                if let Some(image) = image_block(whole.as_str()) {
                    flush(&mut blocks, &mut current, pending);
                    blocks.push(Block::Image(image));
                }
            }
            "td" | "th" => current.push(' '),
            "li" => {
                flush(&mut blocks, &mut current, pending);
                pending = if closing { Pending::Paragraph } else { Pending::Bullet };
            }
            "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                flush(&mut blocks, &mut current, pending);
                pending = if closing { Pending::Paragraph } else { Pending::Heading };
            }
            "p" | "div" | "tr" | "table" | "ul" | "ol" | "blockquote" | "pre" | "section"
            | "article" | "dl" | "dt" | "dd" | "hr" => {
                flush(&mut blocks, &mut current, pending);
                if pending != Pending::Bullet || matches!(name.as_str(), "ul" | "ol") {
                    pending = Pending::Paragraph;
                }
            }
            _ => {}
        }
    }
    current.push_str(&text[last..]);
    flush(&mut blocks, &mut current, pending);

    blocks
}

fn flush(blocks: &mut Vec<Block>, current: &mut String, pending: Pending) {
    let decoded = decode_entities(current);
    let text = WHITESPACE.replace_all(decoded.trim(), " ").into_owned();
    current.clear();
    if text.is_empty() {
        return;
    }
    blocks.push(match pending {
        Pending::Paragraph => Block::Paragraph(text),
        Pending::Bullet => Block::Bullet(text),
        Pending::Heading => Block::Heading3(text),
    });
}

/// Image reference from an `<img>` tag. Tags without a source are dropped.
fn image_block(tag: &str) -> Option<ImageBlock> {
    let mut src = None;
    let mut width = None;
    let mut height = None;
    for caps in ATTRIBUTE.captures_iter(tag) {
        let value = decode_entities(&caps[2]);
        match caps[1].to_ascii_lowercase().as_str() {
            "src" => src = Some(value),
            "width" => width = dimension(&value),
            "height" => height = dimension(&value),
            _ => {}
        }
    }

    let src = src.filter(|s| !s.trim().is_empty())?;
    let mut image = ImageBlock::new(src.trim());
    image.width = width;
    image.height = height;
    Some(image)
}

/// `"320"` or `"320px"`; percentages are ignored.
fn dimension(value: &str) -> Option<f32> {
    value.trim().trim_end_matches("px").trim().parse::<f32>().ok().filter(|v| *v > 0.0)
}

/// Decode named and numeric character references.
pub fn decode_entities(text: &str) -> String {
    ENTITY
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let entity = &caps[1];
            let decoded = if let Some(hex) =
                entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(entity)
            };
            decoded.map_or_else(|| caps[0].to_string(), |c| c.to_string())
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        "auml" => 'ä',
        "ouml" => 'ö',
        "uuml" => 'ü',
        "Auml" => 'Ä',
        "Ouml" => 'Ö',
        "Uuml" => 'Ü',
        "szlig" => 'ß',
        "euro" => '€',
        "sect" => '§',
        "deg" => '°',
        "copy" => '©',
        "reg" => '®',
        "trade" => '™',
        "hellip" => '…',
        "ndash" => '–',
        "mdash" => '—',
        "bdquo" => '„',
        "ldquo" => '“',
        "rdquo" => '”',
        "lsquo" => '‘',
        "rsquo" => '’',
        "laquo" => '«',
        "raquo" => '»',
        "bull" => '•',
        "eacute" => 'é',
        "egrave" => 'è',
        "agrave" => 'à',
        _ => return None,
    };
    Some(c)
}

/// Escape text for embedding into generated HTML.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paragraphs_keep_order() {
        let blocks = html_to_blocks("<p>Erster Absatz</p><p>Zweiter <b>Absatz</b></p>");
        assert_eq!(
            blocks,
            vec![
                Block::Paragraph("Erster Absatz".into()),
                Block::Paragraph("Zweiter Absatz".into()),
            ]
        );
    }

    #[test]
    fn test_line_breaks_do_not_glue_words() {
        let blocks = html_to_blocks("Zeile eins<br>Zeile zwei<br/>");
        assert_eq!(blocks, vec![Block::Paragraph("Zeile eins Zeile zwei".into())]);
    }

    #[test]
    fn test_list_items_become_bullets() {
        let blocks = html_to_blocks("<p>Vorher</p><ul><li>Eins</li><li>Zwei</li></ul>Nachher");
        assert_eq!(
            blocks,
            vec![
                Block::Paragraph("Vorher".into()),
                Block::Bullet("Eins".into()),
                Block::Bullet("Zwei".into()),
                Block::Paragraph("Nachher".into()),
            ]
        );
    }

    #[test]
    fn test_inline_headings() {
        let blocks = html_to_blocks("<h4>Frage</h4><div>Antwort</div>");
        assert_eq!(
            blocks,
            vec![Block::Heading3("Frage".into()), Block::Paragraph("Antwort".into())]
        );
    }

    #[test]
    fn test_images_split_paragraphs() {
        let blocks = html_to_blocks(
            r#"<p>Siehe <img src="https://moodle.example.org/pluginfile.php/12/bild.png?time=1&amp;x=2" width="320" height="200px" alt="x"> unten</p>"#,
        );
        let mut image = ImageBlock::new("https://moodle.example.org/pluginfile.php/12/bild.png?time=1&x=2");
        image.width = Some(320.0);
        image.height = Some(200.0);
        assert_eq!(
            blocks,
            vec![
                Block::Paragraph("Siehe".into()),
                Block::Image(image),
                Block::Paragraph("unten".into()),
            ]
        );
    }

    #[test]
    fn test_image_without_source_is_dropped() {
        let blocks = html_to_blocks(r#"<p>Text <img alt="leer" width="50%"></p>"#);
        assert_eq!(blocks, vec![Block::Paragraph("Text".into())]);
    }

    #[test]
    fn test_scripts_and_comments_are_removed() {
        let blocks = html_to_blocks("<script>alert(1)</script><!-- note --><p>Text</p>");
        assert_eq!(blocks, vec![Block::Paragraph("Text".into())]);
    }

    #[test]
    fn test_entities() {
        assert_eq!(decode_entities("Gr&uuml;&szlig;e &amp; mehr"), "Grüße & mehr");
        assert_eq!(decode_entities("&#8222;x&#x201C;"), "„x“");
        assert_eq!(decode_entities("&unknown;"), "&unknown;");
    }

    #[test]
    fn test_escaped_tags_stay_text() {
        let blocks = html_to_blocks("<p>&lt;b&gt; ist fett</p>");
        assert_eq!(blocks, vec![Block::Paragraph("<b> ist fett".into())]);
    }

    #[test]
    fn test_empty_input() {
        assert!(html_to_blocks("").is_empty());
        assert!(html_to_blocks("<p> </p><div>&nbsp;</div>").is_empty());
    }
}
