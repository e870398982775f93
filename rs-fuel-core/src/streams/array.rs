use serde::{Deserialize, Serialize};

use crate::error::{Result, StreamError};

/// Dense, row-major array of token ids.
///
/// # Invariants
/// - `data.len()` equals the product of `shape`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct IntArray {
	shape: Vec<usize>,
	data: Vec<u32>,
}

impl IntArray {
	/// # Errors
	/// Returns `InvalidRequest` if `data` does not fill `shape` exactly.
	pub fn new(shape: Vec<usize>, data: Vec<u32>) -> Result<Self> {
		let expected: usize = shape.iter().product();
		if expected != data.len() {
			return Err(StreamError::InvalidRequest(format!(
				"shape {shape:?} holds {expected} values, got {}",
				data.len()
			)));
		}
		Ok(Self { shape, data })
	}

	/// `rows x cols` matrix. `data.len()` must be `rows * cols`.
	pub(crate) fn matrix(rows: usize, cols: usize, data: Vec<u32>) -> Self {
		debug_assert_eq!(rows * cols, data.len());
		Self { shape: vec![rows, cols], data }
	}

	pub(crate) fn vector(data: Vec<u32>) -> Self {
		Self { shape: vec![data.len()], data }
	}

	pub fn shape(&self) -> &[usize] {
		&self.shape
	}

	pub fn data(&self) -> &[u32] {
		&self.data
	}

	/// Size of the first dimension.
	pub fn len(&self) -> usize {
		self.shape.first().copied().unwrap_or(0)
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Number of values in one entry of the first dimension.
	fn stride(&self) -> usize {
		self.shape.iter().skip(1).product()
	}

	/// Returns the `index`-th entry of the first dimension.
	pub fn row(&self, index: usize) -> Option<&[u32]> {
		if index >= self.len() {
			return None;
		}
		let stride = self.stride();
		self.data.get(index * stride..(index + 1) * stride)
	}

	/// Copies the array into nested rows.
	pub fn to_rows(&self) -> Vec<Vec<u32>> {
		(0..self.len()).filter_map(|index| self.row(index)).map(<[u32]>::to_vec).collect()
	}

	pub fn into_data(self) -> Vec<u32> {
		self.data
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rows_follow_row_major_layout() {
		let array = IntArray::new(vec![2, 3], vec![1, 2, 3, 4, 5, 6]).unwrap();
		assert_eq!(array.len(), 2);
		assert_eq!(array.row(1), Some(&[4, 5, 6][..]));
		assert_eq!(array.row(2), None);
		assert_eq!(array.to_rows(), vec![vec![1, 2, 3], vec![4, 5, 6]]);
	}

	#[test]
	fn vectors_have_scalar_rows() {
		let array = IntArray::vector(vec![7, 8]);
		assert_eq!(array.shape(), &[2]);
		assert_eq!(array.row(0), Some(&[7][..]));
	}

	#[test]
	fn mismatched_shape_is_rejected() {
		assert!(IntArray::new(vec![2, 2], vec![1, 2, 3]).is_err());
	}
}
