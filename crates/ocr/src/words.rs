use crate::types::BoundingBox;

/// Split OCR text into whitespace-separated words.
pub fn split_words(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_string).collect()
}

/// Lay words out on a rough grid over the image.
///
/// This is a placeholder for OCR engines that return plain text without
/// geometry: the layout model only needs one plausible box per word.
/// Words go `floor(sqrt(n))` to a line, each line gets an equal share of the
/// height, and every box is clamped inside the image with non-zero extent.
pub fn estimate_boxes(words: &[String], image_width: u32, image_height: u32) -> Vec<BoundingBox> {
    if words.is_empty() {
        return Vec::new();
    }

    let lengths: Vec<u64> = words.iter().map(|w| w.chars().count() as u64).collect();
    let width = u64::from(image_width);
    let height = u64::from(image_height);

    let words_per_line = ((words.len() as f64).sqrt() as u64).max(1);
    let num_lines = (words.len() as u64).div_ceil(words_per_line);
    let line_height = height / num_lines.max(1);
    let longest = lengths.iter().copied().max().unwrap_or(0);
    let char_width = width / longest.max(1);

    lengths
        .iter()
        .enumerate()
        .map(|(i, &len)| {
            let line = i as u64 / words_per_line;
            let pos_in_line = i as u64 % words_per_line;

            let x0 = pos_in_line * char_width * (len + 1);
            let y0 = line * line_height;
            let x1 = x0 + len * char_width;
            let y1 = y0 + line_height;

            let x0 = x0.min(width.saturating_sub(1));
            let y0 = y0.min(height.saturating_sub(1));
            let x1 = x1.min(width).max(x0 + 1);
            let y1 = y1.min(height).max(y0 + 1);

            BoundingBox::new(clamp_u32(x0), clamp_u32(y0), clamp_u32(x1), clamp_u32(y1))
        })
        .collect()
}

/// Words and their estimated boxes in one step.
pub fn extract_words_and_boxes(
    text: &str,
    image_width: u32,
    image_height: u32,
) -> (Vec<String>, Vec<BoundingBox>) {
    let words = split_words(text);
    let boxes = estimate_boxes(&words, image_width, image_height);
    (words, boxes)
}

fn clamp_u32(v: u64) -> u32 {
    u32::try_from(v).unwrap_or(u32::MAX)
}
