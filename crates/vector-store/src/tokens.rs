use unicode_segmentation::UnicodeSegmentation;

/// Lowercased Unicode words of `text`, in order
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.unicode_words().map(str::to_lowercase)
}
