//! Render batch partitioning.
//!
//! The renderer is cheaper per record when it gets several records at once, so
//! recipients are grouped in pairs. When the count is odd the *first* batch
//! takes three, which leaves every later batch at exactly two.

use thiserror::Error;

/// Partitioning lost or duplicated a reference. Always a defect, never recovered.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("original list is different {expected} != {actual}")]
pub struct IntegrityError {
    pub expected: usize,
    pub actual: usize,
}

/// Split `refs` into render batches, verifying the split before returning it.
pub fn partition<T: Clone + PartialEq>(refs: &[T]) -> Result<Vec<Vec<T>>, IntegrityError> {
    let head = if refs.len() % 2 == 1 { 3.min(refs.len()) } else { 0 };

    let mut batches: Vec<Vec<T>> = Vec::with_capacity(refs.len() / 2 + 1);
    if head > 0 {
        batches.push(refs[..head].to_vec());
    }
    batches.extend(refs[head..].chunks(2).map(<[T]>::to_vec));

    verify_partition(refs, &batches)?;
    Ok(batches)
}

/// Check that `batches`, flattened in order, reproduce `original`.
pub fn verify_partition<T: PartialEq>(original: &[T], batches: &[Vec<T>]) -> Result<(), IntegrityError> {
    let actual = batches.iter().map(Vec::len).sum::<usize>();
    let same_order = batches.iter().flatten().eq(original.iter());
    if actual != original.len() || !same_order {
        return Err(IntegrityError {
            expected: original.len(),
            actual,
        });
    }
    Ok(())
}
