//! Binary tensor buffers returned by `eval_get` and layer queries.
//!
//! Layout (all little-endian):
//!
//! ```text
//! i32 num_dims | i32 dim[0] .. dim[num_dims-1] | f32 values (row-major)
//! ```

use serde_json::Value;

use crate::error::GraphError;

const WORD: usize = 4;

#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    dims: Vec<usize>,
    values: Vec<f32>,
}

impl Tensor {
    pub fn new(dims: Vec<usize>, values: Vec<f32>) -> Result<Self, GraphError> {
        let expected = element_count(&dims)?;
        if expected != values.len() {
            return Err(GraphError::tensor(format!(
                "shape {:?} needs {} values, got {}",
                dims,
                expected,
                values.len()
            )));
        }
        Ok(Self { dims, values })
    }

    /// Build a 2-d tensor from equally sized rows.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self, GraphError> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != cols) {
            return Err(GraphError::tensor("ragged rows"));
        }
        let values = rows.iter().flatten().copied().collect();
        Self::new(vec![rows.len(), cols], values)
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Short summary such as `(2, 3)`, the form used on link labels.
    pub fn shape_label(&self) -> String {
        let dims: Vec<String> = self.dims.iter().map(|d| d.to_string()).collect();
        format!("({})", dims.join(", "))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, GraphError> {
        let mut words = bytes.chunks(WORD);
        let mut next_i32 = |what: &str| -> Result<i32, GraphError> {
            match words.next() {
                Some(chunk) if chunk.len() == WORD => {
                    Ok(i32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                }
                _ => Err(GraphError::tensor(format!("buffer truncated in {}", what))),
            }
        };

        let num_dims = next_i32("header")?;
        let num_dims = usize::try_from(num_dims)
            .map_err(|_| GraphError::tensor(format!("negative dimension count {}", num_dims)))?;

        let mut dims = Vec::with_capacity(num_dims.min(16));
        for _ in 0..num_dims {
            let dim = next_i32("dimensions")?;
            let dim = usize::try_from(dim)
                .map_err(|_| GraphError::tensor(format!("negative dimension {}", dim)))?;
            dims.push(dim);
        }

        let offset = WORD * (1 + num_dims);
        let payload = &bytes[offset..];
        if payload.len() % WORD != 0 {
            return Err(GraphError::tensor(format!(
                "payload of {} bytes is not a whole number of f32 values",
                payload.len()
            )));
        }
        let expected = element_count(&dims)?;
        if expected != payload.len() / WORD {
            return Err(GraphError::tensor(format!(
                "shape {:?} needs {} values, buffer holds {}",
                dims,
                expected,
                payload.len() / WORD
            )));
        }
        let values = payload
            .chunks_exact(WORD)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        Self::new(dims, values)
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(WORD * (1 + self.dims.len() + self.values.len()));
        out.extend_from_slice(&(self.dims.len() as i32).to_le_bytes());
        for d in &self.dims {
            out.extend_from_slice(&(*d as i32).to_le_bytes());
        }
        for v in &self.values {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    /// Nested JSON arrays, built from the innermost dimension outwards.
    pub fn to_nested(&self) -> Value {
        let mut level: Vec<Value> = self
            .values
            .iter()
            .map(|v| Value::from(f64::from(*v)))
            .collect();
        if self.dims.is_empty() {
            return level.pop().unwrap_or(Value::Null);
        }
        for &dim in self.dims.iter().skip(1).rev() {
            if dim == 0 {
                // every group is empty; the outer dims decide how many there are
                let groups: usize = self.dims.iter().take_while(|d| **d != 0).product();
                level = vec![Value::Array(Vec::new()); groups];
                continue;
            }
            let mut grouped = Vec::with_capacity(level.len() / dim);
            let mut iter = level.into_iter();
            loop {
                let chunk: Vec<Value> = iter.by_ref().take(dim).collect();
                if chunk.is_empty() {
                    break;
                }
                grouped.push(Value::Array(chunk));
            }
            level = grouped;
        }
        Value::Array(level)
    }
}

/// Number of values a shape holds, or an error when it does not fit in `usize`.
fn element_count(dims: &[usize]) -> Result<usize, GraphError> {
    dims.iter()
        .try_fold(1usize, |acc, d| acc.checked_mul(*d))
        .ok_or_else(|| GraphError::tensor("shape overflows"))
}
