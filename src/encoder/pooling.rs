/// Reductions from per-token hidden states to one vector per sequence.
use serde::{Deserialize, Serialize};

/// How per-token hidden states are averaged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pooling {
    /// Plain average over every token position, padding included.
    #[default]
    Mean,
    /// Average over positions whose attention mask is set.
    MaskedMean,
}

/// Pool a flat `[batch, seq_len, hidden_size]` tensor into `batch` vectors.
///
/// `attention_mask` is flat `[batch, seq_len]` and only read for
/// [`Pooling::MaskedMean`].
#[must_use]
pub fn pool(
    hidden_data: &[f32],
    attention_mask: &[i64],
    batch_size: usize,
    seq_len: usize,
    hidden_size: usize,
    pooling: Pooling,
) -> Vec<Vec<f32>> {
    let row = seq_len * hidden_size;

    (0..batch_size)
        .map(|b| {
            let hidden = &hidden_data[b * row..(b + 1) * row];
            match pooling {
                Pooling::Mean => mean_pooling(hidden, seq_len, hidden_size),
                Pooling::MaskedMean => {
                    let mask = &attention_mask[b * seq_len..(b + 1) * seq_len];
                    masked_mean_pooling(hidden, mask, seq_len, hidden_size)
                }
            }
        })
        .collect()
}

/// Mean over the token axis of a `[seq_len, hidden_size]` slice.
fn mean_pooling(hidden_data: &[f32], seq_len: usize, hidden_size: usize) -> Vec<f32> {
    let mut result = vec![0.0f32; hidden_size];
    if seq_len == 0 || hidden_size == 0 {
        return result;
    }

    for token in hidden_data.chunks_exact(hidden_size) {
        for (acc, v) in result.iter_mut().zip(token) {
            *acc += v;
        }
    }

    let n = seq_len as f32;
    for v in &mut result {
        *v /= n;
    }

    result
}

/// Mean pooling over hidden states weighted by attention mask.
fn masked_mean_pooling(
    hidden_data: &[f32],
    attention_mask: &[i64],
    seq_len: usize,
    hidden_size: usize,
) -> Vec<f32> {
    let mut result = vec![0.0f32; hidden_size];
    let mut mask_sum: f32 = 0.0;

    for t in 0..seq_len {
        let mask = attention_mask[t] as f32;
        mask_sum += mask;

        for h in 0..hidden_size {
            result[h] += hidden_data[t * hidden_size + h] * mask;
        }
    }

    // Average by number of real tokens
    if mask_sum > 0.0 {
        for v in &mut result {
            *v /= mask_sum;
        }
    }

    result
}

/// L2-normalize a vector in place. Zero vectors are left unchanged.
pub fn l2_normalize(vec: &mut [f32]) {
    let norm_sq: f32 = vec.iter().map(|v| v * v).sum();
    if norm_sq == 0.0 {
        return;
    }

    let inv_norm = 1.0 / norm_sq.sqrt();
    for v in vec {
        *v *= inv_norm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_pooling_single_token() {
        let hidden = vec![1.0, 2.0, 3.0];
        let result = pool(&hidden, &[1], 1, 1, 3, Pooling::Mean);
        assert_eq!(result, vec![vec![1.0, 2.0, 3.0]]);
    }

    #[test]
    fn test_mean_pooling_includes_padding() {
        // 2 tokens, hidden_size=2, second token is padding
        let hidden = vec![1.0, 2.0, 3.0, 6.0];
        let result = pool(&hidden, &[1, 0], 1, 2, 2, Pooling::Mean);
        assert_eq!(result, vec![vec![2.0, 4.0]]);
    }

    #[test]
    fn test_masked_mean_pooling_skips_padding() {
        let hidden = vec![1.0, 2.0, 10.0, 20.0];
        let result = pool(&hidden, &[1, 0], 1, 2, 2, Pooling::MaskedMean);
        assert_eq!(result, vec![vec![1.0, 2.0]]);
    }

    #[test]
    fn test_pool_batch_keeps_row_order() {
        // batch=2, seq_len=2, hidden_size=1
        let hidden = vec![1.0, 3.0, 10.0, 30.0];
        let result = pool(&hidden, &[1, 1, 1, 1], 2, 2, 1, Pooling::Mean);
        assert_eq!(result, vec![vec![2.0], vec![20.0]]);
    }

    #[test]
    fn test_masked_mean_batch_with_uneven_lengths() {
        // second row has one real token and one pad
        let hidden = vec![1.0, 3.0, 10.0, 99.0];
        let result = pool(&hidden, &[1, 1, 1, 0], 2, 2, 1, Pooling::MaskedMean);
        assert_eq!(result, vec![vec![2.0], vec![10.0]]);
    }

    #[test]
    fn test_pool_zero_tokens() {
        let result = pool(&[], &[], 1, 0, 4, Pooling::Mean);
        assert_eq!(result, vec![vec![0.0; 4]]);
        let result = pool(&[], &[], 1, 0, 4, Pooling::MaskedMean);
        assert_eq!(result, vec![vec![0.0; 4]]);
    }

    #[test]
    fn test_l2_normalize() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalize_zero() {
        let mut v = vec![0.0, 0.0, 0.0];
        l2_normalize(&mut v);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_pooling_deserialize() {
        let p: Pooling = serde_json::from_str("\"masked_mean\"").unwrap();
        assert_eq!(p, Pooling::MaskedMean);
        assert_eq!(Pooling::default(), Pooling::Mean);
    }
}
