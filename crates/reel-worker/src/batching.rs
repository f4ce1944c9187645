//! Splitting a slide list into overlapping batches.
//!
//! Batch `i` (0-based) covers `[max(i * size - 1, 0), min((i + 1) * size, len))`.
//! Every batch after the first starts with the previous batch's last slide so
//! the transition across the boundary can be rendered on its own.

use std::ops::Range;

use reel_models::{BatchJob, JobId, SceneOptions};

/// Number of batches needed for `len` slides.
pub fn batch_count(len: usize, batch_size: usize) -> usize {
    if batch_size == 0 {
        return 0;
    }
    len.div_ceil(batch_size)
}

/// Slide index ranges of every batch, in batch order.
pub fn batch_ranges(len: usize, batch_size: usize) -> Vec<Range<usize>> {
    (0..batch_count(len, batch_size))
        .map(|i| {
            let start = (i * batch_size).saturating_sub(1);
            let end = ((i + 1) * batch_size).min(len);
            start..end
        })
        .collect()
}

/// Queue descriptors for every batch of a job.
pub fn plan_batches(
    job_id: &JobId,
    urls: &[String],
    options: &SceneOptions,
    batch_size: usize,
) -> Vec<BatchJob> {
    batch_ranges(urls.len(), batch_size)
        .into_iter()
        .enumerate()
        .map(|(i, range)| BatchJob::new(job_id.clone(), i as u32 + 1, urls[range].to_vec(), options))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::BatchContinuation;

    #[test]
    fn test_forty_five_slides_in_twenties() {
        assert_eq!(batch_count(45, 20), 3);
        assert_eq!(batch_ranges(45, 20), vec![0..20, 19..40, 39..45]);
    }

    #[test]
    fn test_exact_multiple() {
        assert_eq!(batch_ranges(40, 20), vec![0..20, 19..40]);
        assert_eq!(batch_ranges(20, 20), vec![0..20]);
        assert!(batch_ranges(0, 20).is_empty());
    }

    #[test]
    fn test_every_slide_covered_in_order() {
        for len in 1..100 {
            let ranges = batch_ranges(len, 7);
            assert_eq!(ranges.first().map(|r| r.start), Some(0));
            assert_eq!(ranges.last().map(|r| r.end), Some(len));
            for pair in ranges.windows(2) {
                assert_eq!(pair[1].start + 1, pair[0].end);
            }
        }
    }

    #[test]
    fn test_plan_batches() {
        let urls: Vec<String> = (0..45).map(|i| format!("https://img/{}.jpg", i)).collect();
        let options = SceneOptions::default().with_audio(true);
        let batches = plan_batches(&JobId::from("j"), &urls, &options, 20);

        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].batch, 1);
        assert_eq!(batches[0].urls.first().map(String::as_str), Some("https://img/0.jpg"));
        assert_eq!(batches[0].options.batch_continuation, BatchContinuation::Initial);

        assert_eq!(batches[1].urls.len(), 21);
        assert_eq!(batches[1].urls[0], "https://img/19.jpg");
        assert_eq!(batches[2].urls.len(), 6);
        assert_eq!(batches[2].options.batch_continuation, BatchContinuation::Continuation);
        assert!(batches.iter().all(|b| !b.options.audio));
    }
}
