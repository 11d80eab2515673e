//! Offline heuristics for saved captures.

use crate::classify::{classify, Classification};
use crate::frame::{hex_preview, REQUEST_MAGIC, RESPONSE_MAGIC};

/// Full EH575 frame: 103 x 52 pixels, one byte each.
pub const EH575_IMAGE_WIDTH: usize = 103;
pub const EH575_IMAGE_HEIGHT: usize = 52;
pub const EH575_IMAGE_BYTES: usize = EH575_IMAGE_WIDTH * EH575_IMAGE_HEIGHT;

const RUN_SCAN_MIN_SIZE: usize = 100;
const RUN_SCAN_LIMIT: usize = 1000;
const LONG_RUN: usize = 50;
const DIMENSION_GUESSES: usize = 5;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Header {
    Request,
    Response,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Likelihood {
    /// Under 10% zeros.
    High,
    /// Under 50% zeros.
    Medium,
    Low,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Analysis {
    pub size: usize,
    pub preview: String,
    pub header: Option<Header>,
    pub non_zero: usize,
    pub likelihood: Likelihood,
    pub classification: Classification,
    /// Shannon entropy in bits per byte.
    pub entropy: f64,
    pub longest_run: usize,
    pub mean: f64,
    pub variance: f64,
    pub quality_score: f64,
    pub dimensions: Vec<(usize, usize)>,
}

impl Analysis {
    pub fn of(data: &[u8]) -> Self {
        let size = data.len();
        let classification = classify(data);
        let non_zero = data.iter().filter(|&&b| b != 0).count();

        let header = if data.starts_with(&REQUEST_MAGIC) {
            Some(Header::Request)
        } else if data.starts_with(&RESPONSE_MAGIC) {
            Some(Header::Response)
        } else {
            None
        };

        let zero_ratio = if size == 0 { 1.0 } else { (size - non_zero) as f64 / size as f64 };
        let likelihood = if zero_ratio < 0.1 {
            Likelihood::High
        } else if zero_ratio < 0.5 {
            Likelihood::Medium
        } else {
            Likelihood::Low
        };

        let (mean, variance) = mean_variance(data);
        let longest_run = if size > RUN_SCAN_MIN_SIZE {
            longest_run(&data[..size.min(RUN_SCAN_LIMIT)])
        } else {
            0
        };
        let quality_score = classification.non_zero_ratio * 100.0
            * classification.distinct_ratio()
            * (variance / 100.0);

        Self {
            size,
            preview: hex_preview(data, 32),
            header,
            non_zero,
            likelihood,
            classification,
            entropy: entropy(data),
            longest_run,
            mean,
            variance,
            quality_score,
            dimensions: dimensions(size),
        }
    }

    pub fn has_long_run(&self) -> bool {
        self.longest_run > LONG_RUN
    }

    pub fn is_eh575_image(&self) -> bool {
        self.size == EH575_IMAGE_BYTES
    }
}

pub fn entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let mut counts = [0usize; 256];
    for &b in data {
        counts[usize::from(b)] += 1;
    }

    let n = data.len() as f64;
    counts.iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n;
            -p * p.log2()
        })
        .sum()
}

fn mean_variance(data: &[u8]) -> (f64, f64) {
    if data.is_empty() {
        return (0.0, 0.0);
    }

    let n = data.len() as f64;
    let mean = data.iter().map(|&b| f64::from(b)).sum::<f64>() / n;
    let variance = data.iter()
        .map(|&b| {
            let d = f64::from(b) - mean;
            d * d
        })
        .sum::<f64>() / n;

    (mean, variance)
}

pub fn longest_run(data: &[u8]) -> usize {
    let mut longest = 0;
    let mut current = 0;
    let mut last = None;

    for &b in data {
        if Some(b) == last {
            current += 1;
        } else {
            current = 1;
            last = Some(b);
        }
        longest = longest.max(current);
    }

    longest
}

/// Plausible (width, height) pairs for a raw 8-bit image of `size` bytes.
pub fn dimensions(size: usize) -> Vec<(usize, usize)> {
    if size == EH575_IMAGE_BYTES {
        return vec![(EH575_IMAGE_WIDTH, EH575_IMAGE_HEIGHT)];
    }
    if size <= 5000 {
        return Vec::new();
    }

    (50..200)
        .filter(|width| size % width == 0)
        .map(|width| (width, size / width))
        .filter(|(_, height)| (30..=100).contains(height))
        .take(DIMENSION_GUESSES)
        .collect()
}
