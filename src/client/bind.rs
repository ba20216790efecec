//! Bind buffers

use std::mem::size_of;

/// NULL indicator values
pub const IND_NOTNULL : i16 = 0;
pub const IND_NULL    : i16 = -1;

/// Declared type of a bound value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// NUL terminated character string (`SQLT_STR`)
    Text,
    /// Native signed 64-bit integer (`SQLT_INT`)
    Integer,
}

impl DataType {
    /// Size of one element when the type has a fixed size.
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            DataType::Integer => Some(size_of::<i64>()),
            DataType::Text => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// Array bounds of a bulk (PL/SQL table) bind.
pub struct ArrayBounds<'a> {
    /// Maximum number of elements the buffer can hold
    pub max_len: u32,
    /// Current number of elements; an output bind receives the returned count here
    pub cur_len: &'a mut u32,
}

/**
    Memory a parameter exposes to the client when it is bound.

    `data` holds `capacity()` elements of `value_size` bytes each. A scalar bind is
    a single-element buffer without array bounds.
*/
pub struct BindBuffer<'a> {
    pub data_type: DataType,
    pub direction: Direction,
    pub data: &'a mut [u8],
    pub value_size: usize,
    pub indicators: &'a mut [i16],
    pub array: Option<ArrayBounds<'a>>,
}

impl BindBuffer<'_> {
    pub fn is_array(&self) -> bool {
        self.array.is_some()
    }

    /// Number of elements currently held.
    pub fn len(&self) -> usize {
        match &self.array {
            Some(bounds) => *bounds.cur_len as usize,
            None => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of elements the buffer has room for.
    pub fn capacity(&self) -> usize {
        match &self.array {
            Some(bounds) => bounds.max_len as usize,
            None => 1,
        }
    }

    /// Sets the number of returned elements of an array bind.
    pub fn set_len(&mut self, len: usize) {
        if let Some(bounds) = self.array.as_mut() {
            *bounds.cur_len = len.min(bounds.max_len as usize) as u32;
        }
    }

    pub fn is_null(&self, idx: usize) -> bool {
        self.indicators.get(idx).map_or(true, |&ind| ind == IND_NULL)
    }

    fn element(&self, idx: usize) -> Option<&[u8]> {
        let start = idx * self.value_size;
        self.data.get(start..start + self.value_size)
    }

    fn element_mut(&mut self, idx: usize) -> Option<&mut [u8]> {
        let start = idx * self.value_size;
        self.data.get_mut(start..start + self.value_size)
    }

    /// Returns the text of the element at `idx` unless it is NULL or not text.
    pub fn text(&self, idx: usize) -> Option<&str> {
        if self.data_type != DataType::Text || self.is_null(idx) {
            return None;
        }
        let bytes = self.element(idx)?;
        let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        std::str::from_utf8(&bytes[..len]).ok()
    }

    /// Returns the integer at `idx` unless it is NULL or not an integer.
    pub fn int(&self, idx: usize) -> Option<i64> {
        if self.data_type != DataType::Integer || self.is_null(idx) {
            return None;
        }
        let bytes = self.element(idx)?;
        let mut raw = [0u8; size_of::<i64>()];
        let len = raw.len();
        raw.copy_from_slice(bytes.get(..len)?);
        Some(i64::from_ne_bytes(raw))
    }

    /// Stores text at `idx`. Returns `false` when it (and its terminating NUL) does not fit.
    pub fn set_text(&mut self, idx: usize, text: &str) -> bool {
        if self.data_type != DataType::Text {
            return false;
        }
        match self.element_mut(idx) {
            Some(elem) if text.len() < elem.len() => {
                elem[..text.len()].copy_from_slice(text.as_bytes());
                elem[text.len()] = 0;
            }
            _ => return false,
        }
        if let Some(ind) = self.indicators.get_mut(idx) {
            *ind = IND_NOTNULL;
        }
        true
    }

    /// Stores an integer at `idx`. Returns `false` when `idx` is out of bounds.
    pub fn set_int(&mut self, idx: usize, value: i64) -> bool {
        if self.data_type != DataType::Integer {
            return false;
        }
        match self.element_mut(idx) {
            Some(elem) if elem.len() >= size_of::<i64>() => {
                elem[..size_of::<i64>()].copy_from_slice(&value.to_ne_bytes());
            }
            _ => return false,
        }
        if let Some(ind) = self.indicators.get_mut(idx) {
            *ind = IND_NOTNULL;
        }
        true
    }

    pub fn set_null(&mut self, idx: usize) {
        if let Some(ind) = self.indicators.get_mut(idx) {
            *ind = IND_NULL;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_elements() {
        let mut data = vec![0u8; 3 * 4];
        let mut inds = vec![IND_NULL; 3];
        let mut len = 0u32;
        let mut buf = BindBuffer {
            data_type: DataType::Text,
            direction: Direction::Input,
            data: &mut data,
            value_size: 4,
            indicators: &mut inds,
            array: Some(ArrayBounds { max_len: 3, cur_len: &mut len }),
        };
        assert!(buf.set_text(0, "abc"));
        assert!(!buf.set_text(1, "abcd"), "no room for the terminating NUL");
        assert!(buf.set_text(2, ""));
        buf.set_len(3);

        assert_eq!(buf.len(), 3);
        assert_eq!(buf.text(0), Some("abc"));
        assert_eq!(buf.text(1), None);
        assert_eq!(buf.text(2), Some(""));
        assert_eq!(buf.int(0), None);
    }

    #[test]
    fn scalar_int() {
        let mut data = vec![0u8; 8];
        let mut inds = vec![IND_NULL];
        let mut buf = BindBuffer {
            data_type: DataType::Integer,
            direction: Direction::Output,
            data: &mut data,
            value_size: 8,
            indicators: &mut inds,
            array: None,
        };
        assert!(buf.is_null(0));
        assert!(buf.set_int(0, -42));
        assert_eq!(buf.int(0), Some(-42));
        assert_eq!(buf.len(), 1);
        assert!(!buf.set_int(1, 7));
    }
}
