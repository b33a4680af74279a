//! Avro object container files of surveillance records.
//!
//! Records are read as generic Avro values so the extractor can write them
//! back unchanged; the typed [`SurveillanceRecord`] is pulled out field by
//! field alongside.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use apache_avro::types::Value;
use apache_avro::{Reader, Schema, Writer};
use opensky_core::SurveillanceRecord;
use tracing::info;

use crate::error::{Result, ToolError};

/// Canonical record schema, used whenever the tools create a container from scratch.
pub const RECORD_SCHEMA: &str = r#"
{
  "type": "record",
  "name": "ModeSEncodedMessage",
  "namespace": "org.opensky.avro.v2",
  "fields": [
    {"name": "timeAtServer", "type": "double"},
    {"name": "timeAtSensor", "type": ["null", "long"], "default": null},
    {"name": "timestamp", "type": ["null", "long"], "default": null},
    {"name": "sensorSerialNumber", "type": "int"},
    {"name": "sensorType", "type": "string"},
    {"name": "sensorLatitude", "type": ["null", "double"], "default": null},
    {"name": "sensorLongitude", "type": ["null", "double"], "default": null},
    {"name": "sensorAltitude", "type": ["null", "double"], "default": null},
    {"name": "rawMessage", "type": "string"}
  ]
}
"#;

pub fn record_schema() -> Result<Schema> {
    Ok(Schema::parse_str(RECORD_SCHEMA)?)
}

/// Every input must be an existing, readable regular file.
pub fn check_inputs(paths: &[PathBuf]) -> Result<()> {
    for path in paths {
        if !path.is_file() || File::open(path).is_err() {
            return Err(ToolError::Precondition(format!(
                "{}: Avro file not found or cannot be read",
                path.display()
            )));
        }
    }
    Ok(())
}

/// The output must not exist yet.
pub fn check_output(path: &Path, what: &str) -> Result<()> {
    if path.exists() {
        return Err(ToolError::Precondition(format!(
            "{}: output {what} already exists",
            path.display()
        )));
    }
    Ok(())
}

/// Sequential reader over one container file.
pub struct AvroSource {
    path: PathBuf,
    reader: Reader<'static, BufReader<File>>,
    index: u64,
}

impl AvroSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| ToolError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = Reader::new(BufReader::new(file))?;
        info!(path = %path.display(), "reading records");
        Ok(AvroSource {
            path: path.to_path_buf(),
            reader,
            index: 0,
        })
    }

    pub fn schema(&self) -> &Schema {
        self.reader.writer_schema()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Iterator for AvroSource {
    type Item = Result<(Value, SurveillanceRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        let value = match self.reader.next()? {
            Ok(value) => value,
            Err(e) => return Some(Err(e.into())),
        };
        self.index += 1;
        let item = value_to_record(&value)
            .map(|record| (value, record))
            .map_err(|reason| ToolError::Record {
                path: self.path.clone(),
                index: self.index,
                reason,
            });
        Some(item)
    }
}

/// Writer for a fresh container file.
pub struct AvroSink<'a> {
    path: PathBuf,
    writer: Writer<'a, BufWriter<File>>,
}

impl<'a> AvroSink<'a> {
    /// Create `path`, failing if it already exists.
    pub fn create(path: &Path, schema: &'a Schema) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|source| ToolError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(AvroSink {
            path: path.to_path_buf(),
            writer: Writer::new(schema, BufWriter::new(file)),
        })
    }

    pub fn append(&mut self, value: Value) -> Result<()> {
        self.writer.append(value)?;
        Ok(())
    }

    /// Flush the final block and close the file.
    pub fn finish(self) -> Result<()> {
        let mut out = self.writer.into_inner()?;
        out.flush().map_err(|source| ToolError::Io {
            path: self.path,
            source,
        })
    }
}

// ---------------------------------------------------------------------------
// Value <-> record
// ---------------------------------------------------------------------------

fn strip_union(value: &Value) -> &Value {
    match value {
        Value::Union(_, inner) => inner.as_ref(),
        other => other,
    }
}

fn as_f64(value: &Value) -> Option<Option<f64>> {
    match strip_union(value) {
        Value::Null => Some(None),
        Value::Double(v) => Some(Some(*v)),
        Value::Float(v) => Some(Some(*v as f64)),
        Value::Long(v) => Some(Some(*v as f64)),
        Value::Int(v) => Some(Some(*v as f64)),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<Option<i64>> {
    match strip_union(value) {
        Value::Null => Some(None),
        Value::Long(v) => Some(Some(*v)),
        Value::Int(v) => Some(Some(*v as i64)),
        Value::Double(v) => Some(Some(v.round() as i64)),
        Value::Float(v) => Some(Some(v.round() as i64)),
        _ => None,
    }
}

fn as_string(value: &Value) -> Option<String> {
    match strip_union(value) {
        Value::String(s) => Some(s.clone()),
        Value::Enum(_, s) => Some(s.clone()),
        Value::Bytes(b) => String::from_utf8(b.clone()).ok(),
        _ => None,
    }
}

/// Extract a [`SurveillanceRecord`] from a generic record value.
pub fn value_to_record(value: &Value) -> std::result::Result<SurveillanceRecord, String> {
    let Value::Record(fields) = value else {
        return Err("not a record".into());
    };
    let field = |name: &str| fields.iter().find(|(n, _)| n == name).map(|(_, v)| v);
    let required = |name: &str| field(name).ok_or_else(|| format!("missing field `{name}`"));
    let bad = |name: &str, want: &str| format!("field `{name}`: expected {want}");

    let optional_f64 = |name: &str| match field(name) {
        None => Ok(None),
        Some(v) => as_f64(v).ok_or_else(|| bad(name, "double")),
    };
    let optional_i64 = |name: &str| match field(name) {
        None => Ok(None),
        Some(v) => as_i64(v).ok_or_else(|| bad(name, "long")),
    };

    let time_at_server = as_f64(required("timeAtServer")?)
        .flatten()
        .ok_or_else(|| bad("timeAtServer", "double"))?;
    let sensor_serial = as_i64(required("sensorSerialNumber")?)
        .flatten()
        .and_then(|v| i32::try_from(v).ok())
        .ok_or_else(|| bad("sensorSerialNumber", "int"))?;
    let sensor_type =
        as_string(required("sensorType")?).ok_or_else(|| bad("sensorType", "string"))?;
    let raw_message =
        as_string(required("rawMessage")?).ok_or_else(|| bad("rawMessage", "string"))?;

    Ok(SurveillanceRecord {
        time_at_server,
        time_at_sensor: optional_i64("timeAtSensor")?,
        timestamp: optional_i64("timestamp")?,
        sensor_serial,
        sensor_type,
        sensor_latitude: optional_f64("sensorLatitude")?,
        sensor_longitude: optional_f64("sensorLongitude")?,
        sensor_altitude: optional_f64("sensorAltitude")?,
        raw_message,
    })
}

fn nullable<T>(value: Option<T>, wrap: impl FnOnce(T) -> Value) -> Value {
    match value {
        None => Value::Union(0, Box::new(Value::Null)),
        Some(v) => Value::Union(1, Box::new(wrap(v))),
    }
}

/// Encode a record against [`RECORD_SCHEMA`].
pub fn record_to_value(record: &SurveillanceRecord) -> Value {
    Value::Record(vec![
        ("timeAtServer".into(), Value::Double(record.time_at_server)),
        ("timeAtSensor".into(), nullable(record.time_at_sensor, Value::Long)),
        ("timestamp".into(), nullable(record.timestamp, Value::Long)),
        ("sensorSerialNumber".into(), Value::Int(record.sensor_serial)),
        ("sensorType".into(), Value::String(record.sensor_type.clone())),
        ("sensorLatitude".into(), nullable(record.sensor_latitude, Value::Double)),
        ("sensorLongitude".into(), nullable(record.sensor_longitude, Value::Double)),
        ("sensorAltitude".into(), nullable(record.sensor_altitude, Value::Double)),
        ("rawMessage".into(), Value::String(record.raw_message.clone())),
    ])
}

/// Write `records` to a new container with the canonical schema.
pub fn write_records(path: &Path, records: &[SurveillanceRecord]) -> Result<()> {
    let schema = record_schema()?;
    let mut sink = AvroSink::create(path, &schema)?;
    for record in records {
        sink.append(record_to_value(record))?;
    }
    sink.finish()
}
