//! Token sequence to transcript.

use crate::vocab::VocabularyTable;

/// Decode token ids into text.
///
/// Stops at the first end-of-transcript id without appending it. Ids at or
/// above EOT are control/special tokens and are skipped, as are ids missing
/// from the table. Fragments are concatenated as-is; any spacing is encoded
/// in the fragments themselves.
#[must_use]
pub fn decode(tokens: &[u32], vocab: &VocabularyTable) -> String {
    let eot = vocab.controls().eot;
    let mut text = String::new();
    for &id in tokens {
        if id == eot {
            break;
        }
        if id >= eot {
            continue;
        }
        if let Some(word) = vocab.word(id) {
            text.push_str(word);
        }
    }
    text
}

#[cfg(test)]
mod tests {
    use crate::vocab::VocabularyTable;

    use super::decode;

    fn vocab() -> VocabularyTable {
        VocabularyTable::from_words(vec![
            "hello".into(),
            " world".into(),
            "!".into(),
        ])
    }

    #[test]
    fn concatenates_text_tokens() {
        let v = vocab();
        assert_eq!(decode(&[0, 1, 2], &v), "hello world!");
    }

    #[test]
    fn stops_at_eot_without_appending() {
        let v = vocab();
        let eot = v.controls().eot;
        assert_eq!(decode(&[0, eot, 1], &v), "hello");
    }

    #[test]
    fn skips_control_tokens() {
        let v = vocab();
        let c = v.controls();
        // SOT, task tokens, and timestamps never reach the text.
        let tokens = [c.sot, c.transcribe, 0, c.timestamp_begin + 5, 1];
        assert_eq!(decode(&tokens, &v), "hello world");
    }

    #[test]
    fn skips_unknown_ids() {
        let v = vocab();
        assert_eq!(decode(&[0, 1_000_000, 1], &v), "hello world");
    }

    #[test]
    fn empty_tokens_decode_to_empty_text() {
        assert_eq!(decode(&[], &vocab()), "");
    }
}
