//! Fixed-window text chunking with overlap

/// Splits `text` into windows of `window` characters, each starting
/// `window - overlap` characters after the previous one. The last window
/// ends exactly at the end of the text.
///
/// Lengths are Unicode scalar values, so multi-byte text is never cut
/// inside a character.
pub fn chunk_text(text: &str, window: usize, overlap: usize) -> anyhow::Result<Vec<String>> {
    if window == 0 {
        return Err(anyhow::anyhow!("Chunk window must be positive"));
    }
    if overlap >= window {
        return Err(anyhow::anyhow!(
            "Chunk overlap ({}) must be smaller than the window ({})",
            overlap,
            window
        ));
    }

    // Byte offset of every char boundary, plus the end of the text.
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let len = boundaries.len() - 1;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < len {
        let end = (start + window).min(len);
        chunks.push(text[boundaries[start]..boundaries[end]].to_string());
        if end == len {
            break;
        }
        start = end - overlap;
    }
    Ok(chunks)
}

/// Number of chunks `chunk_text` produces for a text of `len` characters.
pub fn expected_chunk_count(len: usize, window: usize, overlap: usize) -> usize {
    match len {
        0 => 0,
        l if l <= window => 1,
        l => {
            let step = window - overlap;
            (l - overlap).div_ceil(step)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_empty_text_has_no_chunks() {
        assert!(chunk_text("", 1000, 200).unwrap().is_empty());
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        let chunks = chunk_text("Apply for a CPR number first.", 1000, 200).unwrap();
        assert_eq!(chunks, vec!["Apply for a CPR number first."]);
    }

    #[test]
    fn test_windows_overlap() {
        let text: String = ('a'..='j').collect();
        let chunks = chunk_text(&text, 4, 1).unwrap();
        assert_eq!(chunks, vec!["abcd", "defg", "ghij"]);
    }

    #[test]
    fn test_tail_ends_at_text_end() {
        let text = "x".repeat(1500);
        let chunks = chunk_text(&text, 1000, 200).unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 1000);
        assert_eq!(chunks[1].len(), 700);
    }

    #[test]
    fn test_multibyte_characters_are_counted_once() {
        let text = "æøå".repeat(4);
        let chunks = chunk_text(&text, 6, 2).unwrap();
        assert_eq!(chunks, vec!["æøåæøå", "øåæøåæ", "åæøå"]);
    }

    #[test]
    fn test_invalid_overlap_rejected() {
        assert!(chunk_text("abc", 10, 10).is_err());
        assert!(chunk_text("abc", 0, 0).is_err());
    }

    proptest! {
        #[test]
        fn prop_chunk_count_matches_formula(
            len in 0usize..3000,
            window in 1usize..400,
            overlap_ratio in 0.0f64..1.0,
        ) {
            let overlap = ((window as f64) * overlap_ratio) as usize;
            prop_assume!(overlap < window);
            let text = "é".repeat(len);

            let chunks = chunk_text(&text, window, overlap).unwrap();

            prop_assert_eq!(chunks.len(), expected_chunk_count(len, window, overlap));
            for chunk in &chunks {
                prop_assert!(chunk.chars().count() <= window);
            }
            if let Some(last) = chunks.last() {
                prop_assert!(text.ends_with(last.as_str()));
            }
        }
    }
}
