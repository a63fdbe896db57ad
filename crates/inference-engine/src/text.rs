//! Text preprocessing
//!
//! The same cleaning and tokenization the training pipeline applied before
//! fitting the vectorizer; predictions are only meaningful if both agree.

use once_cell::sync::Lazy;
use regex::Regex;

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static EMOTICON: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?::|;|=)(?:-)?(?:\)|\(|D|P)").unwrap());
static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\W+").unwrap());

/// Cleans raw review text
///
/// HTML tags are stripped, the text is lowercased and every run of non-word
/// characters becomes one space. Emoticons found after tag removal are
/// appended at the end without their nose, e.g. `:-)` becomes `:)`.
///
/// ```
/// use inference_engine::text::clean_text;
///
/// assert_eq!(clean_text("<b>Great</b> movie :-)"), "great movie :)");
/// ```
pub fn clean_text(text: &str) -> String {
    let text = HTML_TAG.replace_all(text, "");

    let emoticons: Vec<&str> = EMOTICON.find_iter(&text).map(|m| m.as_str()).collect();

    let lowered = text.to_lowercase();
    let mut cleaned = NON_WORD.replace_all(&lowered, " ").into_owned();

    cleaned.push_str(&emoticons.join(" ").replace('-', ""));
    cleaned
}

/// Splits text on whitespace
pub fn tokenize(text: &str) -> Vec<&str> {
    text.split_whitespace().collect()
}

/// Runs cleaning and tokenization and joins the tokens back into one document
pub fn preprocess(text: &str) -> String {
    tokenize(&clean_text(text)).join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_strips_markup_and_punctuation() {
        assert_eq!(
            clean_text("This is <br /><br />a <i>test</i>!!!"),
            "this is a test "
        );
    }

    #[test]
    fn test_clean_text_keeps_emoticons() {
        assert_eq!(clean_text("Loved it :) ;-("), "loved it :) ;(");
        assert_eq!(clean_text("so good=D"), "so good d=D");
        assert_eq!(clean_text("no faces here"), "no faces here");
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("  I love\tthis \n movie "), vec!["I", "love", "this", "movie"]);
        assert!(tokenize("   ").is_empty());
    }

    #[test]
    fn test_preprocess() {
        assert_eq!(preprocess("I love this so much!"), "i love this so much");
    }
}
