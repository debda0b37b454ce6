/// Error-reporting decorator for any [`Encoder`].
///
/// Failures are logged and re-raised. With `fill_on_error` they are logged
/// and replaced by placeholder vectors of the right shape instead.
use tracing::{error, warn};

use super::{Encoder, EncoderError};

/// Value of every component of a placeholder vector.
pub const PLACEHOLDER_VALUE: f32 = 1e-7;

/// Wraps an encoder, logging every failure of `encode_text` and
/// `bulk_encode` before re-raising it or filling in placeholders.
pub struct CatchErrors<E> {
    inner: E,
    fill_on_error: bool,
}

impl<E: Encoder> CatchErrors<E> {
    /// Wrap `inner`. With `fill_on_error`, failures other than
    /// [`EncoderError::InvalidArgument`] return [`PLACEHOLDER_VALUE`] vectors.
    #[must_use]
    pub fn new(inner: E, fill_on_error: bool) -> Self {
        Self {
            inner,
            fill_on_error,
        }
    }

    /// Borrow the wrapped encoder.
    pub fn inner(&self) -> &E {
        &self.inner
    }

    fn placeholder(&self) -> Vec<f32> {
        vec![PLACEHOLDER_VALUE; self.inner.dimensions()]
    }

    /// Log `err`; decide whether the caller should fill in placeholders.
    fn report(&self, op: &str, err: EncoderError) -> Result<(), EncoderError> {
        if self.fill_on_error && !matches!(err, EncoderError::InvalidArgument(_)) {
            warn!("{op} failed, filling in placeholder vector: {err}");
            Ok(())
        } else {
            error!("{op} failed: {err}");
            Err(err)
        }
    }
}

impl<E: Encoder> Encoder for CatchErrors<E> {
    fn encode_text(&self, text: &str) -> Result<Vec<f32>, EncoderError> {
        match self.inner.encode_text(text) {
            Ok(v) => Ok(v),
            Err(e) => self.report("encode", e).map(|()| self.placeholder()),
        }
    }

    fn bulk_encode(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EncoderError> {
        match self.inner.bulk_encode(texts) {
            Ok(v) => Ok(v),
            Err(e) => self
                .report("bulk_encode", e)
                .map(|()| vec![self.placeholder(); texts.len()]),
        }
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }
}
