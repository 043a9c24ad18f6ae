//! Reading `Request.Response` signals.
//!
//! The signal carries `(status: u, results: a{sv})`. Status 0 means the user
//! confirmed, 1 that they cancelled, and anything else that the interaction
//! ended some other way.

use crate::error::{PortalError, PortalResult};
use crate::value::Value;

#[cfg(feature = "tracing")]
use tracing::trace;

/// Handler invoked with the unwrapped variant of a dictionary entry.
pub type EntryHandler<'a> = &'a mut dyn FnMut(&Value) -> PortalResult<()>;

/// Return the `results` dictionary of a response, or the outcome of a
/// non-success status.
pub fn read_response_results(args: &[Value]) -> PortalResult<&Value> {
    let missing = || PortalError::protocol("D-Bus response signal is missing one or more arguments.");
    let status = args.first().ok_or_else(missing)?;
    let code = status.as_u32().ok_or_else(|| {
        PortalError::protocol("D-Bus response signal argument is not a uint32.")
    })?;
    match code {
        0 => args.get(1).ok_or_else(missing),
        1 => Err(PortalError::Cancelled),
        _ => Err(PortalError::protocol(
            "D-Bus file dialog interaction was ended abruptly.",
        )),
    }
}

/// Walk an `a{sv}` dictionary, dispatching entries to handlers by key.
///
/// Unknown keys are skipped. The first handler error stops the walk.
pub fn read_dict(dict: &Value, handlers: &mut [(&str, EntryHandler<'_>)]) -> PortalResult<()> {
    let Value::Dict(entries) = dict else {
        return Err(PortalError::protocol(
            "D-Bus response signal argument is not an array.",
        ));
    };
    for (key, value) in entries {
        let key = key.as_str().ok_or_else(|| {
            PortalError::protocol("D-Bus response signal dict entry does not start with a string.")
        })?;
        let inner = value.variant_inner().ok_or_else(|| {
            PortalError::protocol("D-Bus response signal dict entry value is not a variant.")
        })?;
        match handlers.iter_mut().find(|(k, _)| *k == key) {
            Some((_, handler)) => handler(inner)?,
            None => {
                #[cfg(feature = "tracing")]
                trace!("Skipping response field {}", key);
            }
        }
    }
    Ok(())
}

/// Fields of a successful response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResponseFields {
    /// Selected URIs, in the order the portal listed them
    pub uris: Vec<String>,
    /// First glob of the filter active when the dialog closed
    pub current_filter: Option<String>,
}

fn read_uris(value: &Value) -> PortalResult<Vec<String>> {
    let Value::Array(items) = value else {
        return Err(PortalError::protocol(
            "D-Bus response signal URI iter is not an array.",
        ));
    };
    let uris = items
        .iter()
        .map(|item| {
            item.as_str().map(str::to_owned).ok_or_else(|| {
                PortalError::protocol("D-Bus response signal URI sub iter is not a string.")
            })
        })
        .collect::<PortalResult<Vec<_>>>()?;
    if uris.is_empty() {
        return Err(PortalError::protocol(
            "D-Bus response signal URI sub iter is not a string.",
        ));
    }
    Ok(uris)
}

/// First glob of a `(sa(us))` filter value; `None` for any other shape.
fn first_filter_glob(value: &Value) -> Option<String> {
    let Value::Struct(fields) = value else {
        return None;
    };
    let Some(Value::Array(patterns)) = fields.get(1) else {
        return None;
    };
    let Some(Value::Struct(pair)) = patterns.first() else {
        return None;
    };
    match pair.as_slice() {
        [Value::U32(0), Value::Str(glob), ..] => Some(glob.clone()),
        _ => None,
    }
}

/// Read a response signal's arguments.
///
/// `uris` is mandatory. `current_filter` is only read when `want_filter` is
/// set, and a malformed one is ignored rather than failing the response.
pub fn read_response(args: &[Value], want_filter: bool) -> PortalResult<ResponseFields> {
    let results = read_response_results(args)?;
    let mut uris = None;
    let mut current_filter = None;
    let mut on_uris = |v: &Value| -> PortalResult<()> {
        uris = Some(read_uris(v)?);
        Ok(())
    };
    let mut on_filter = |v: &Value| -> PortalResult<()> {
        current_filter = first_filter_glob(v);
        Ok(())
    };
    if want_filter {
        read_dict(
            results,
            &mut [
                ("uris", &mut on_uris as EntryHandler<'_>),
                ("current_filter", &mut on_filter as EntryHandler<'_>),
            ],
        )?;
    } else {
        read_dict(results, &mut [("uris", &mut on_uris as EntryHandler<'_>)])?;
    }
    let uris =
        uris.ok_or_else(|| PortalError::protocol("D-Bus response signal has no URI field."))?;
    Ok(ResponseFields {
        uris,
        current_filter,
    })
}

/// Object path returned by a FileChooser call.
pub fn read_request_path(reply: &[Value]) -> PortalResult<&str> {
    let first = reply
        .first()
        .ok_or_else(|| PortalError::protocol("D-Bus reply is missing an argument."))?;
    first
        .as_object_path()
        .ok_or_else(|| PortalError::protocol("D-Bus reply is not an object path."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn uris(list: &[&str]) -> Value {
        Value::Array(list.iter().map(|&u| Value::from(u)).collect())
    }

    fn filter(name: &str, glob: &str) -> Value {
        Value::Struct(vec![
            name.into(),
            Value::Array(vec![Value::Struct(vec![0u32.into(), glob.into()])]),
        ])
    }

    #[test]
    fn status_codes_map_to_outcomes() {
        let ok = [Value::U32(0), Value::string_dict([("uris", uris(&["file:///a"]))])];
        assert_eq!(read_response(&ok, false).unwrap().uris, vec!["file:///a"]);

        let cancelled = [Value::U32(1), Value::string_dict::<_, &str>([])];
        assert!(read_response(&cancelled, false).unwrap_err().is_cancelled());

        let ended = [Value::U32(2), Value::string_dict::<_, &str>([])];
        assert_eq!(
            read_response(&ended, false).unwrap_err().to_string(),
            "D-Bus file dialog interaction was ended abruptly."
        );
    }

    #[test]
    fn shape_errors_are_reported() {
        assert_eq!(
            read_response(&[], false).unwrap_err().to_string(),
            "D-Bus response signal is missing one or more arguments."
        );
        assert_eq!(
            read_response(&[Value::from("0")], false).unwrap_err().to_string(),
            "D-Bus response signal argument is not a uint32."
        );
        assert_eq!(
            read_response(&[Value::U32(0), Value::U32(3)], false)
                .unwrap_err()
                .to_string(),
            "D-Bus response signal argument is not an array."
        );
        let not_variant = Value::Dict(vec![("uris".into(), uris(&["file:///a"]))]);
        assert_eq!(
            read_response(&[Value::U32(0), not_variant], false)
                .unwrap_err()
                .to_string(),
            "D-Bus response signal dict entry value is not a variant."
        );
    }

    #[test]
    fn missing_uris_field() {
        let args = [Value::U32(0), Value::string_dict([("choices", Value::Array(vec![]))])];
        assert_eq!(
            read_response(&args, false).unwrap_err().to_string(),
            "D-Bus response signal has no URI field."
        );
    }

    #[test]
    fn current_filter_is_best_effort() {
        let args = [
            Value::U32(0),
            Value::string_dict([
                ("current_filter", filter("PNG", "*.png")),
                ("uris", uris(&["file:///a"])),
            ]),
        ];
        let fields = read_response(&args, true).unwrap();
        assert_eq!(fields.current_filter.as_deref(), Some("*.png"));
        assert_eq!(read_response(&args, false).unwrap().current_filter, None);

        let odd = [
            Value::U32(0),
            Value::string_dict([
                ("uris", uris(&["file:///a"])),
                ("current_filter", Value::U32(7)),
            ]),
        ];
        assert_eq!(read_response(&odd, true).unwrap().current_filter, None);
    }

    #[test]
    fn request_path_must_be_object_path() {
        let ok = [Value::ObjectPath("/org/freedesktop/portal/desktop/request/1_2/T".into())];
        assert!(read_request_path(&ok).unwrap().ends_with("/T"));
        assert_eq!(
            read_request_path(&[Value::from("/x")]).unwrap_err().to_string(),
            "D-Bus reply is not an object path."
        );
        assert_eq!(
            read_request_path(&[]).unwrap_err().to_string(),
            "D-Bus reply is missing an argument."
        );
    }
}
