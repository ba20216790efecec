//! Typed statement parameters

use std::mem::size_of;

use crate::{Error, Result, client::{Outcome, BindBuffer, ArrayBounds, DataType, Direction, IND_NULL, IND_NOTNULL}};

/// Maximum size in bytes of a scalar value or of an array element.
pub const MAX_SCALAR_SIZE : usize = 32767;

/// Value of a parameter or of an array element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Text(String),
}

impl From<i64> for Value {
    fn from(val: i64) -> Self {
        Value::Int(val)
    }
}

impl From<String> for Value {
    fn from(val: String) -> Self {
        Value::Text(val)
    }
}

impl From<&str> for Value {
    fn from(val: &str) -> Self {
        Value::Text(val.to_owned())
    }
}

/// Target of [`Parameter::bind_to`]: a prepared statement that accepts buffers by placeholder name.
pub trait Binder {
    fn bind_by_name(&mut self, name: &str, buf: BindBuffer<'_>) -> Outcome<()>;
    fn read_out(&mut self, name: &str, buf: BindBuffer<'_>) -> Outcome<()>;
}

/**
    A typed value holder that attaches itself to a prepared statement.

    A scalar parameter attaches its value buffer and NULL indicator. An array parameter attaches
    its buffer, element size, capacity and current length, which makes the client bind it as a
    PL/SQL table.
*/
pub trait Parameter: Send {
    /// Placeholder name without the leading colon.
    fn name(&self) -> &str;
    fn data_type(&self) -> DataType;
    fn direction(&self) -> Direction;
    fn bind_to(&mut self, binder: &mut dyn Binder) -> Outcome<()>;
    /// Collects the value the statement returned. Input parameters have nothing to collect.
    fn read_back(&mut self, binder: &mut dyn Binder) -> Outcome<()>;
    /// Current values; a scalar has exactly one.
    fn values(&self) -> Vec<Option<Value>>;
}

fn placeholder(name: &str) -> Result<String> {
    let name = name.strip_prefix(':').unwrap_or(name);
    if name.is_empty() {
        Err(Error::new("parameter placeholder name is empty"))
    } else {
        Ok(name.to_owned())
    }
}

fn check_text(text: &str, max_len: usize) -> Result<()> {
    if text.contains('\0') {
        Err(Error::new("text value contains NUL"))
    } else if text.len() > max_len {
        Err(Error::msg(format!("text value of {} bytes exceeds {} bytes", text.len(), max_len)))
    } else {
        Ok(())
    }
}

fn decode_text(elem: &[u8]) -> String {
    let len = elem.iter().position(|&b| b == 0).unwrap_or(elem.len());
    String::from_utf8_lossy(&elem[..len]).into_owned()
}

fn decode_int(elem: &[u8]) -> i64 {
    let mut raw = [0u8; size_of::<i64>()];
    let len = raw.len().min(elem.len());
    raw[..len].copy_from_slice(&elem[..len]);
    i64::from_ne_bytes(raw)
}

fn decode(data_type: DataType, elem: &[u8]) -> Value {
    match data_type {
        DataType::Integer => Value::Int(decode_int(elem)),
        DataType::Text => Value::Text(decode_text(elem)),
    }
}

/// Scalar parameter
pub struct ParameterValue {
    name: String,
    data_type: DataType,
    direction: Direction,
    data: Vec<u8>,
    indicator: [i16; 1],
}

impl ParameterValue {
    fn with_buffer(name: &str, data_type: DataType, direction: Direction, size: usize) -> Result<Self> {
        Ok(Self { name: placeholder(name)?, data_type, direction, data: vec![0; size], indicator: [IND_NULL] })
    }

    /// Returns an input text parameter.
    pub fn text(name: &str, value: &str) -> Result<Self> {
        let mut param = Self::with_buffer(name, DataType::Text, Direction::Input, MAX_SCALAR_SIZE + 1)?;
        param.set_text(value)?;
        Ok(param)
    }

    /// Returns an input integer parameter.
    pub fn int(name: &str, value: i64) -> Result<Self> {
        let mut param = Self::with_buffer(name, DataType::Integer, Direction::Input, size_of::<i64>())?;
        param.set_int(value)?;
        Ok(param)
    }

    /// Returns an output parameter. `max_len` limits returned text and is ignored for integers.
    pub fn output(name: &str, data_type: DataType, max_len: usize) -> Result<Self> {
        let size = match data_type.fixed_size() {
            Some(size) => size,
            None if max_len > MAX_SCALAR_SIZE => {
                return Err(Error::msg(format!("output size {} exceeds {} bytes", max_len, MAX_SCALAR_SIZE)));
            }
            None => max_len + 1,
        };
        Self::with_buffer(name, data_type, Direction::Output, size)
    }

    pub fn set_text(&mut self, value: &str) -> Result<()> {
        if self.data_type != DataType::Text {
            return Err(Error::msg(format!("parameter {} is not text", self.name)));
        }
        check_text(value, self.data.len() - 1)?;
        self.data[..value.len()].copy_from_slice(value.as_bytes());
        self.data[value.len()] = 0;
        self.indicator[0] = IND_NOTNULL;
        Ok(())
    }

    pub fn set_int(&mut self, value: i64) -> Result<()> {
        if self.data_type != DataType::Integer {
            return Err(Error::msg(format!("parameter {} is not an integer", self.name)));
        }
        self.data.copy_from_slice(&value.to_ne_bytes());
        self.indicator[0] = IND_NOTNULL;
        Ok(())
    }

    pub fn set_null(&mut self) {
        self.indicator[0] = IND_NULL;
    }

    pub fn is_null(&self) -> bool {
        self.indicator[0] == IND_NULL
    }

    /// Returns the text value, or `None` if it is NULL or not text.
    pub fn as_text(&self) -> Option<String> {
        match self.value()? {
            Value::Text(text) => Some(text),
            Value::Int(_) => None,
        }
    }

    /// Returns the integer value, or `None` if it is NULL or not an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self.value()? {
            Value::Int(val) => Some(val),
            Value::Text(_) => None,
        }
    }

    pub fn value(&self) -> Option<Value> {
        if self.is_null() {
            None
        } else {
            Some(decode(self.data_type, &self.data))
        }
    }

    fn buffer(&mut self) -> BindBuffer<'_> {
        BindBuffer {
            data_type:  self.data_type,
            direction:  self.direction,
            value_size: self.data.len(),
            data:       &mut self.data,
            indicators: &mut self.indicator,
            array:      None,
        }
    }
}

impl Parameter for ParameterValue {
    fn name(&self) -> &str {
        &self.name
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn bind_to(&mut self, binder: &mut dyn Binder) -> Outcome<()> {
        let name = self.name.clone();
        binder.bind_by_name(&name, self.buffer())
    }

    fn read_back(&mut self, binder: &mut dyn Binder) -> Outcome<()> {
        if self.direction == Direction::Input {
            return Ok(());
        }
        let name = self.name.clone();
        binder.read_out(&name, self.buffer())
    }

    fn values(&self) -> Vec<Option<Value>> {
        vec![self.value()]
    }
}

/**
    Array (PL/SQL table) parameter.

    Elements share one buffer of `capacity` slots of `element_size` bytes. The number of
    elements never exceeds the capacity.
*/
pub struct ParameterArray {
    name: String,
    data_type: DataType,
    direction: Direction,
    data: Vec<u8>,
    element_size: usize,
    capacity: u32,
    len: u32,
    indicators: Vec<i16>,
}

impl ParameterArray {
    fn with_buffer(name: &str, data_type: DataType, direction: Direction, capacity: usize, element_size: usize) -> Result<Self> {
        let capacity = capacity.max(1);
        Ok(Self {
            name: placeholder(name)?,
            data_type, direction,
            data: vec![0; capacity * element_size],
            element_size,
            capacity: capacity as u32,
            len: 0,
            indicators: vec![IND_NULL; capacity],
        })
    }

    /**
        Returns an input text array sized to hold `values`.

        # Example

        ```
        use plsql_gateway::stmt::{ParameterArray, Parameter, Value};

        let names = ParameterArray::texts("n", &["REQUEST_METHOD", "PATH_INFO"])?;
        assert_eq!(names.len(), 2);
        assert_eq!(names.element_size(), 15);
        assert_eq!(names.values()[1], Some(Value::Text("PATH_INFO".to_string())));
        # Ok::<(),plsql_gateway::Error>(())
        ```
    */
    pub fn texts<T: AsRef<str>>(name: &str, values: &[T]) -> Result<Self> {
        let longest = values.iter().map(|val| val.as_ref().len()).max().unwrap_or(0);
        if longest > MAX_SCALAR_SIZE {
            return Err(Error::msg(format!("array element of {} bytes exceeds {} bytes", longest, MAX_SCALAR_SIZE)));
        }
        let mut param = Self::with_buffer(name, DataType::Text, Direction::Input, values.len(), longest + 1)?;
        param.set_texts(values)?;
        Ok(param)
    }

    /// Returns an input integer array.
    pub fn ints(name: &str, values: &[i64]) -> Result<Self> {
        let mut param = Self::with_buffer(name, DataType::Integer, Direction::Input, values.len(), size_of::<i64>())?;
        param.set_ints(values)?;
        Ok(param)
    }

    /// Returns an output array of `capacity` elements. `max_len` limits text elements.
    pub fn output(name: &str, data_type: DataType, capacity: usize, max_len: usize) -> Result<Self> {
        let element_size = match data_type.fixed_size() {
            Some(size) => size,
            None if max_len > MAX_SCALAR_SIZE => {
                return Err(Error::msg(format!("element size {} exceeds {} bytes", max_len, MAX_SCALAR_SIZE)));
            }
            None => max_len + 1,
        };
        Self::with_buffer(name, data_type, Direction::Output, capacity, element_size)
    }

    fn check_len(&self, len: usize) -> Result<()> {
        if len > self.capacity as usize {
            Err(Error::msg(format!("{} elements exceed the capacity {} of {}", len, self.capacity, self.name)))
        } else {
            Ok(())
        }
    }

    /// Replaces the elements. Every text must fit the element size.
    pub fn set_texts<T: AsRef<str>>(&mut self, values: &[T]) -> Result<()> {
        if self.data_type != DataType::Text {
            return Err(Error::msg(format!("parameter {} is not a text array", self.name)));
        }
        self.check_len(values.len())?;
        for val in values {
            check_text(val.as_ref(), self.element_size - 1)?;
        }
        for (idx, val) in values.iter().enumerate() {
            let val = val.as_ref().as_bytes();
            let elem = &mut self.data[idx * self.element_size..(idx + 1) * self.element_size];
            elem[..val.len()].copy_from_slice(val);
            elem[val.len()] = 0;
            self.indicators[idx] = IND_NOTNULL;
        }
        self.truncate_to(values.len());
        Ok(())
    }

    /// Replaces the elements.
    pub fn set_ints(&mut self, values: &[i64]) -> Result<()> {
        if self.data_type != DataType::Integer {
            return Err(Error::msg(format!("parameter {} is not an integer array", self.name)));
        }
        self.check_len(values.len())?;
        for (idx, val) in values.iter().enumerate() {
            self.data[idx * self.element_size..(idx + 1) * self.element_size].copy_from_slice(&val.to_ne_bytes());
            self.indicators[idx] = IND_NOTNULL;
        }
        self.truncate_to(values.len());
        Ok(())
    }

    fn truncate_to(&mut self, len: usize) {
        for ind in &mut self.indicators[len..] {
            *ind = IND_NULL;
        }
        self.len = len as u32;
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }

    /// Returns the element at `idx` or `None` if it is NULL or out of range.
    pub fn get(&self, idx: usize) -> Option<Value> {
        if idx >= self.len() || self.indicators[idx] == IND_NULL {
            return None;
        }
        Some(decode(self.data_type, &self.data[idx * self.element_size..(idx + 1) * self.element_size]))
    }

    fn buffer(&mut self) -> BindBuffer<'_> {
        BindBuffer {
            data_type:  self.data_type,
            direction:  self.direction,
            value_size: self.element_size,
            data:       &mut self.data,
            indicators: &mut self.indicators,
            array:      Some(ArrayBounds { max_len: self.capacity, cur_len: &mut self.len }),
        }
    }
}

impl Parameter for ParameterArray {
    fn name(&self) -> &str {
        &self.name
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn direction(&self) -> Direction {
        self.direction
    }

    fn bind_to(&mut self, binder: &mut dyn Binder) -> Outcome<()> {
        let name = self.name.clone();
        binder.bind_by_name(&name, self.buffer())
    }

    fn read_back(&mut self, binder: &mut dyn Binder) -> Outcome<()> {
        if self.direction == Direction::Input {
            return Ok(());
        }
        let name = self.name.clone();
        binder.read_out(&name, self.buffer())
    }

    fn values(&self) -> Vec<Option<Value>> {
        (0..self.len()).map(|idx| self.get(idx)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_limits() -> Result<()> {
        let mut param = ParameterValue::text(":p", "O'Brien")?;
        assert_eq!(param.name(), "p");
        assert_eq!(param.as_text().as_deref(), Some("O'Brien"));

        let max = "x".repeat(MAX_SCALAR_SIZE);
        param.set_text(&max)?;
        assert_eq!(param.as_text().map(|text| text.len()), Some(MAX_SCALAR_SIZE));

        let res = param.set_text(&"x".repeat(MAX_SCALAR_SIZE + 1));
        assert!(matches!(res, Err(Error::Interface(_))));
        let res = param.set_text("a\0b");
        assert_eq!(res, Err(Error::new("text value contains NUL")));
        let res = param.set_int(1);
        assert_eq!(res, Err(Error::new("parameter p is not an integer")));

        param.set_null();
        assert_eq!(param.value(), None);
        Ok(())
    }

    #[test]
    fn int_scalar() -> Result<()> {
        let mut param = ParameterValue::int("c", 3)?;
        assert_eq!(param.as_int(), Some(3));
        assert!(param.set_text("3").is_err());
        param.set_int(-7)?;
        assert_eq!(param.values(), vec![Some(Value::Int(-7))]);

        let out = ParameterValue::output("r", DataType::Text, 100)?;
        assert!(out.is_null());
        assert!(ParameterValue::output("r", DataType::Text, MAX_SCALAR_SIZE + 1).is_err());
        assert!(ParameterValue::int("", 1).is_err());
        Ok(())
    }

    #[test]
    fn array_capacity() -> Result<()> {
        let mut arr = ParameterArray::texts("v", &["GET", "/home"])?;
        assert_eq!(arr.capacity(), 2);
        assert_eq!(arr.element_size(), 6);

        arr.set_texts(&["POST"])?;
        assert_eq!(arr.len(), 1);
        assert_eq!(arr.get(0), Some(Value::Text("POST".to_string())));
        assert_eq!(arr.get(1), None);

        assert!(arr.set_texts(&["a", "b", "c"]).is_err(), "more elements than capacity");
        assert!(arr.set_texts(&["too long"]).is_err(), "element does not fit");
        assert_eq!(arr.len(), 1);

        let empty = ParameterArray::texts::<&str>("n", &[])?;
        assert!(empty.is_empty());
        assert_eq!(empty.capacity(), 1);

        let ints = ParameterArray::ints("i", &[1, 2, 3])?;
        assert_eq!(ints.values(), vec![Some(Value::Int(1)), Some(Value::Int(2)), Some(Value::Int(3))]);
        Ok(())
    }
}
