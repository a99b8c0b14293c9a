//! Tracking pixel injection into bid creatives.
//!
//! Display markup gets zero-sized `<img>` beacons appended. VAST documents
//! get extra `<Impression>` elements spliced in textually; the VAST itself is
//! never parsed or validated.

use once_cell::sync::Lazy;
use regex::Regex;

static VAST_MARKUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*<\??(?:vast|xml)").expect("VAST detection regex is valid"));

const INLINE_CLOSE: &str = "</InLine>";
const WRAPPER_CLOSE: &str = "</Wrapper>";

/// True when the markup looks like a VAST (or generic XML) document.
#[must_use]
pub fn is_vast_markup(markup: &str) -> bool {
    VAST_MARKUP.is_match(markup)
}

/// Appends one `<img src="…" width="0" height="0"/>` per pixel to `markup`.
#[must_use]
pub fn append_image_pixels<S: AsRef<str>>(markup: &str, pixels: &[S]) -> String {
    let mut out = String::with_capacity(markup.len() + pixels.len() * 64);
    out.push_str(markup);
    for pixel in pixels {
        out.push_str(&format!(
            r#"<img src="{}" width="0" height="0"/>"#,
            pixel.as_ref().replace('"', "&quot;")
        ));
    }
    out
}

/// Splices one `<Impression>` per pixel into a VAST document.
///
/// Impressions go right before the first `</InLine>`, or before the first
/// `</Wrapper>` for wrapper ads. Documents with neither are returned as is.
#[must_use]
pub fn insert_vast_impressions<S: AsRef<str>>(vast: &str, pixels: &[S]) -> String {
    if pixels.is_empty() {
        return vast.to_string();
    }

    let Some(index) = vast
        .find(INLINE_CLOSE)
        .or_else(|| vast.find(WRAPPER_CLOSE))
    else {
        log::debug!("VAST has no InLine or Wrapper element, impressions not injected");
        return vast.to_string();
    };

    let impressions: String = pixels
        .iter()
        .map(|pixel| {
            format!(
                "<Impression><![CDATA[{}]]></Impression>",
                pixel.as_ref().replace("]]>", "]]]]><![CDATA[>")
            )
        })
        .collect();

    let mut out = String::with_capacity(vast.len() + impressions.len());
    out.push_str(&vast[..index]);
    out.push_str(&impressions);
    out.push_str(&vast[index..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_vast_and_xml_prefixes() {
        assert!(is_vast_markup(r#"<?xml version="1.0"?><VAST/>"#));
        assert!(is_vast_markup(r#"  <VAST version="3.0"></VAST>"#));
        assert!(is_vast_markup("\n<vast></vast>"));
        assert!(!is_vast_markup("<script src='x.js'></script>"));
        assert!(!is_vast_markup("<div><VAST></VAST></div>"));
        assert!(!is_vast_markup(""));
    }

    #[test]
    fn appends_image_pixels_in_order() {
        let out = append_image_pixels("<div>ad</div>", &["https://a.test/1", "https://b.test/2"]);
        assert_eq!(
            out,
            r#"<div>ad</div><img src="https://a.test/1" width="0" height="0"/><img src="https://b.test/2" width="0" height="0"/>"#
        );
    }

    #[test]
    fn appends_nothing_without_pixels() {
        let pixels: [&str; 0] = [];
        assert_eq!(append_image_pixels("<b>x</b>", &pixels), "<b>x</b>");
    }

    #[test]
    fn escapes_quotes_in_image_pixels() {
        let out = append_image_pixels("", &[r#"https://a.test/?q="x""#]);
        assert!(out.contains("q=&quot;x&quot;"));
    }

    #[test]
    fn inserts_impressions_before_inline_close() {
        let vast = "<VAST><Ad><InLine><Impression>x</Impression></InLine></Ad></VAST>";
        let out = insert_vast_impressions(vast, &["https://n.test/nurl", "https://h.test/himp"]);
        assert_eq!(
            out,
            "<VAST><Ad><InLine><Impression>x</Impression>\
             <Impression><![CDATA[https://n.test/nurl]]></Impression>\
             <Impression><![CDATA[https://h.test/himp]]></Impression>\
             </InLine></Ad></VAST>"
        );
    }

    #[test]
    fn inserts_impressions_into_wrapper_ads() {
        let vast = "<VAST><Ad><Wrapper><VASTAdTagURI>u</VASTAdTagURI></Wrapper></Ad></VAST>";
        let out = insert_vast_impressions(vast, &["https://n.test/nurl"]);
        assert!(out.contains(
            "<Impression><![CDATA[https://n.test/nurl]]></Impression></Wrapper>"
        ));
    }

    #[test]
    fn leaves_vast_without_ad_body_untouched() {
        let vast = "<VAST version=\"4.0\"></VAST>";
        assert_eq!(insert_vast_impressions(vast, &["https://n.test/nurl"]), vast);
    }

    #[test]
    fn splits_cdata_terminators_in_pixels() {
        let vast = "<VAST><Ad><InLine></InLine></Ad></VAST>";
        let out = insert_vast_impressions(vast, &["https://n.test/?a=]]>"]);
        assert!(out.contains("<![CDATA[https://n.test/?a=]]]]><![CDATA[>]]>"));
    }
}
