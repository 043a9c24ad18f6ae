//! [`Transport`] over the session bus, backed by `zbus`.
//!
//! Incoming signals are only read through per-subscription streams. A stream
//! exists from `add_match` to `remove_match`, so nothing piles up between
//! dialogs and method replies never pass through this transport's inbox.

use std::collections::{HashMap, VecDeque};

use zbus::blocking::{Connection, MessageIterator};
use zbus::message::Type as ZMessageType;
use zbus::zvariant::{OwnedObjectPath, OwnedValue, Structure, Value as ZValue};

use super::{
    CallBody, IncomingMessage, MessageKind, MethodCall, REQUEST_INTERFACE, RESPONSE_MEMBER,
    Transport,
};
use crate::error::{PortalError, PortalResult};
use crate::filters::WireFilter;
use crate::handle::MatchRule;
use crate::message::OptionValue;
use crate::value::Value;

#[cfg(feature = "tracing")]
use tracing::{trace, warn};

/// Signals queued per subscription before the socket reader waits for us.
const SUBSCRIPTION_QUEUE: usize = 16;

/// Session-bus connection plus the streams of the installed match rules.
pub struct ZbusTransport {
    conn: Connection,
    subscriptions: Vec<(String, MessageIterator)>,
    queued: VecDeque<IncomingMessage>,
}

impl ZbusTransport {
    /// Connect to the session bus.
    pub fn session() -> PortalResult<Self> {
        let conn = Connection::session().map_err(|e| PortalError::transport(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    /// Wrap an existing connection.
    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn,
            subscriptions: Vec::new(),
            queued: VecDeque::new(),
        }
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Number of match rules currently installed.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}

/// Bus-side rule for the `Response` signal of one request object.
///
/// The sender is left out: signals carry the portal's unique name, not its
/// well-known one, and the path already names our connection and token.
pub(crate) fn response_rule(rule: &MatchRule) -> zbus::Result<zbus::MatchRule<'_>> {
    Ok(zbus::MatchRule::builder()
        .msg_type(ZMessageType::Signal)
        .path(rule.path.as_str())?
        .interface(REQUEST_INTERFACE)?
        .member(RESPONSE_MEMBER)?
        .build())
}

impl Transport for ZbusTransport {
    fn unique_name(&self) -> Option<String> {
        self.conn.unique_name().map(|name| name.to_string())
    }

    fn add_match(&mut self, rule: &MatchRule) -> PortalResult<()> {
        let bus_rule = response_rule(rule).map_err(|e| PortalError::transport(e.to_string()))?;
        // registers the rule with the bus daemon
        let stream =
            MessageIterator::for_match_rule(bus_rule, &self.conn, Some(SUBSCRIPTION_QUEUE))
                .map_err(|e| PortalError::transport(e.to_string()))?;
        self.subscriptions.push((rule.path.clone(), stream));
        Ok(())
    }

    fn remove_match(&mut self, rule: &MatchRule) -> PortalResult<()> {
        // dropping the stream removes the rule from the bus daemon
        self.subscriptions.retain(|(path, _)| *path != rule.path);
        self.queued
            .retain(|msg| msg.path.as_deref() != Some(rule.path.as_str()));
        Ok(())
    }

    fn call(&mut self, call: &MethodCall) -> PortalResult<Vec<Value>> {
        let reply = match &call.body {
            CallBody::Dialog(body) => {
                let options: HashMap<String, ZValue<'static>> = body
                    .options
                    .iter()
                    .map(|(key, value)| (key.clone(), option_value(value)))
                    .collect();
                self.conn.call_method(
                    Some(call.destination),
                    call.path,
                    Some(call.interface),
                    call.member,
                    &(body.parent_window.clone(), body.title.clone(), options),
                )
            }
            CallBody::ShowItems { uris, startup_id } => self.conn.call_method(
                Some(call.destination),
                call.path,
                Some(call.interface),
                call.member,
                &(uris.clone(), startup_id.clone()),
            ),
        }
        .map_err(|e| PortalError::transport(e.to_string()))?;
        Ok(message_args(&reply))
    }

    fn pop_message(&mut self) -> Option<IncomingMessage> {
        self.queued.pop_front()
    }

    fn read_write(&mut self) -> bool {
        let Some((_, stream)) = self.subscriptions.last_mut() else {
            return false;
        };
        match stream.next() {
            Some(Ok(msg)) => {
                let incoming = incoming_message(&msg);
                #[cfg(feature = "tracing")]
                trace!(
                    "Received {:?} on {:?} ({:?}.{:?})",
                    incoming.kind, incoming.path, incoming.interface, incoming.member
                );
                self.queued.push_back(incoming);
                true
            }
            Some(Err(_err)) => {
                #[cfg(feature = "tracing")]
                warn!("Session bus read failed: {}", _err);
                false
            }
            None => false,
        }
    }
}

fn wire_filter(filter: &WireFilter) -> (String, Vec<(u32, String)>) {
    (filter.name.clone(), filter.patterns.clone())
}

fn option_value(value: &OptionValue) -> ZValue<'static> {
    match value {
        OptionValue::Str(s) => ZValue::from(s.clone()),
        OptionValue::Bool(b) => ZValue::from(*b),
        OptionValue::Bytes(bytes) => ZValue::from(bytes.clone()),
        OptionValue::Filters(list) => {
            ZValue::from(list.iter().map(wire_filter).collect::<Vec<_>>())
        }
        OptionValue::Filter(filter) => ZValue::from(wire_filter(filter)),
    }
}

fn incoming_message(msg: &zbus::Message) -> IncomingMessage {
    let header = msg.header();
    let kind = match header.message_type() {
        ZMessageType::MethodCall => MessageKind::MethodCall,
        ZMessageType::MethodReturn => MessageKind::MethodReturn,
        ZMessageType::Error => MessageKind::Error,
        ZMessageType::Signal => MessageKind::Signal,
        #[allow(unreachable_patterns)]
        _ => MessageKind::Other,
    };
    IncomingMessage {
        kind,
        path: header.path().map(|p| p.as_str().to_owned()),
        interface: header.interface().map(|i| i.as_str().to_owned()),
        member: header.member().map(|m| m.as_str().to_owned()),
        args: message_args(msg),
    }
}

/// Convert a message body into [`Value`]s.
///
/// The two bodies the portal sends us (`o` replies and `ua{sv}` responses) are
/// read with their exact types; anything else goes through a generic
/// structure, with nested dictionaries reported as unsupported.
fn message_args(msg: &zbus::Message) -> Vec<Value> {
    let body = msg.body();
    if let Ok((status, results)) = body.deserialize::<(u32, HashMap<String, OwnedValue>)>() {
        let entries = results
            .iter()
            .map(|(key, value)| {
                (
                    Value::Str(key.clone()),
                    Value::Variant(Box::new(convert(value))),
                )
            })
            .collect();
        return vec![Value::U32(status), Value::Dict(entries)];
    }
    if let Ok(path) = body.deserialize::<OwnedObjectPath>() {
        return vec![Value::ObjectPath(path.as_str().to_owned())];
    }
    match body.deserialize::<Structure<'_>>() {
        Ok(fields) => fields.fields().iter().map(convert).collect(),
        Err(_) => Vec::new(),
    }
}

fn convert(value: &ZValue<'_>) -> Value {
    match value {
        ZValue::Bool(b) => Value::Bool(*b),
        ZValue::U8(b) => Value::Byte(*b),
        ZValue::U32(n) => Value::U32(*n),
        ZValue::Str(s) => Value::Str(s.as_str().to_owned()),
        ZValue::ObjectPath(p) => Value::ObjectPath(p.as_str().to_owned()),
        ZValue::Value(inner) => Value::Variant(Box::new(convert(inner))),
        ZValue::Array(items) => Value::Array(items.iter().map(convert).collect()),
        ZValue::Structure(s) => Value::Struct(s.fields().iter().map(convert).collect()),
        other => Value::Other(other.value_signature().to_string()),
    }
}
