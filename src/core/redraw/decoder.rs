//! Redraw notification decoder
//!
//! Demultiplexes the backend's batched `redraw` notifications into screen
//! commands and hands each one to the action emitter, in strict arrival
//! order. Later tuples in a batch may depend on state mutated by earlier
//! ones (highlight, cursor), so nothing is skipped, coalesced or
//! reordered. Traffic on the plugin channel bypasses this pipeline
//! entirely and is forwarded to the plugin host.

use rmpv::Value;
use tracing::warn;

use super::action::{ScreenCommand, UiAction};
use super::highlight::{Color, Highlight, HighlightFlags, HighlightTracker};
use crate::emitter::ActionEmitter;
use crate::plugin::PluginHost;

/// Notification channel carrying batched screen commands.
pub const REDRAW_METHOD: &str = "redraw";

/// Side channel for plugin-extension traffic.
pub const PLUGIN_METHOD: &str = "oni_plugin_notify";

/// Outcome of decoding a single batch.
enum Decoded {
    Command(ScreenCommand),
    /// Recognized command that intentionally produces nothing.
    Acknowledged,
    Unknown,
    Malformed,
}

/// Translates inbound notifications into ordered UI actions.
pub struct RedrawDecoder {
    highlight: HighlightTracker,
    active: bool,
}

impl Default for RedrawDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl RedrawDecoder {
    pub fn new() -> Self {
        Self {
            highlight: HighlightTracker::new(),
            active: true,
        }
    }

    /// Stop decoding. Once the session is disconnected no further actions
    /// may be emitted, even if stale notifications are still delivered.
    pub fn shutdown(&mut self) {
        self.active = false;
    }

    /// Process one inbound notification to completion.
    pub fn handle_notification(
        &mut self,
        method: &str,
        params: &[Value],
        emitter: &mut ActionEmitter,
        plugins: &mut dyn PluginHost,
    ) {
        if !self.active {
            return;
        }

        match method {
            REDRAW_METHOD => {
                for batch in params {
                    self.decode_batch(batch, emitter);
                }
            }
            PLUGIN_METHOD => forward_plugin(params, plugins),
            other => warn!(method = other, "unhandled notification"),
        }
    }

    /// Decode one batch: a command name followed by its parameter tuples.
    /// A batch that cannot be interpreted is skipped; its siblings still
    /// execute.
    fn decode_batch(&mut self, batch: &Value, emitter: &mut ActionEmitter) {
        let items = match batch {
            Value::Array(items) => items,
            other => {
                warn!(batch = %other, "redraw batch is not an array");
                return;
            }
        };
        let Some((name, tuples)) = items.split_first() else {
            warn!("empty redraw batch");
            return;
        };
        let Some(name) = name.as_str() else {
            warn!("redraw command name is not a string");
            return;
        };

        match decode_command(name, tuples) {
            Decoded::Command(command) => self.interpret(command, emitter),
            Decoded::Acknowledged => {}
            Decoded::Unknown => warn!(command = name, "unknown redraw command"),
            Decoded::Malformed => warn!(command = name, "malformed redraw batch"),
        }
    }

    /// Apply a command's side effects and emit its action.
    fn interpret(&mut self, command: ScreenCommand, emitter: &mut ActionEmitter) {
        let action = match command {
            ScreenCommand::CursorGoto { row, col } => UiAction::CursorGoto { row, col },
            ScreenCommand::Put(text) => UiAction::Put {
                text,
                highlight: self.highlight.current(),
            },
            ScreenCommand::SetScrollRegion {
                top,
                bottom,
                left,
                right,
            } => UiAction::SetScrollRegion {
                top,
                bottom,
                left,
                right,
            },
            ScreenCommand::Scroll(count) => UiAction::Scroll { count },
            ScreenCommand::SetHighlight(highlight) => {
                self.highlight.apply(highlight.clone());
                UiAction::SetHighlight(highlight)
            }
            ScreenCommand::Resize { rows, cols } => UiAction::Resize { rows, cols },
            ScreenCommand::EolClear => UiAction::EolClear,
            ScreenCommand::Clear => UiAction::Clear,
            ScreenCommand::UpdateForeground(color) => UiAction::SetForeground(color),
            ScreenCommand::UpdateBackground(color) => UiAction::SetBackground(color),
            ScreenCommand::ModeChange(mode) => UiAction::ModeChange(mode),
        };

        emitter.emit(&action);

        // mode_change has a second observable effect besides its action.
        if let UiAction::ModeChange(mode) = &action {
            emitter.emit_mode(mode);
        }
    }
}

/// Strip the plugin-facing method name from the payload and forward the
/// remaining fields. Produces no screen actions and touches no state.
fn forward_plugin(params: &[Value], plugins: &mut dyn PluginHost) {
    let Some(Value::Array(fields)) = params.first() else {
        warn!("plugin notification payload is not an array");
        return;
    };
    let Some((method, args)) = fields.split_first() else {
        warn!("plugin notification payload is empty");
        return;
    };
    let Some(method) = method.as_str() else {
        warn!("plugin method name is not a string");
        return;
    };
    plugins.call(method, args.to_vec());
}

fn decode_command(name: &str, tuples: &[Value]) -> Decoded {
    match name {
        "cursor_goto" => {
            let Some(fields) = tuple(tuples, 0) else {
                return Decoded::Malformed;
            };
            match (nth_u16(fields, 0), nth_u16(fields, 1)) {
                (Some(row), Some(col)) => Decoded::Command(ScreenCommand::CursorGoto { row, col }),
                _ => Decoded::Malformed,
            }
        }
        "put" => {
            // Every tuple contributes its first field; the whole batch
            // becomes a single ordered write.
            let mut text = String::new();
            for entry in tuples {
                if let Value::Array(fields) = entry {
                    if let Some(fragment) = fields.first().and_then(Value::as_str) {
                        text.push_str(fragment);
                    }
                }
            }
            Decoded::Command(ScreenCommand::Put(text))
        }
        "set_scroll_region" => {
            let Some(fields) = tuple(tuples, 0) else {
                return Decoded::Malformed;
            };
            match (
                nth_u16(fields, 0),
                nth_u16(fields, 1),
                nth_u16(fields, 2),
                nth_u16(fields, 3),
            ) {
                (Some(top), Some(bottom), Some(left), Some(right)) => {
                    Decoded::Command(ScreenCommand::SetScrollRegion {
                        top,
                        bottom,
                        left,
                        right,
                    })
                }
                _ => Decoded::Malformed,
            }
        }
        "scroll" => match tuple(tuples, 0).and_then(|fields| nth_i64(fields, 0)) {
            Some(count) => Decoded::Command(ScreenCommand::Scroll(count)),
            None => Decoded::Malformed,
        },
        "highlight_set" => {
            // Coalescing semantics: only the last tuple in the batch is
            // authoritative.
            let Some(last) = tuples.last() else {
                return Decoded::Malformed;
            };
            let Value::Array(fields) = last else {
                return Decoded::Malformed;
            };
            match fields.first() {
                Some(Value::Map(entries)) => {
                    Decoded::Command(ScreenCommand::SetHighlight(decode_highlight(entries)))
                }
                _ => Decoded::Malformed,
            }
        }
        "resize" => {
            let Some(fields) = tuple(tuples, 0) else {
                return Decoded::Malformed;
            };
            // The notification carries (cols, rows), reversed relative to
            // the outbound resize request.
            match (nth_u16(fields, 0), nth_u16(fields, 1)) {
                (Some(cols), Some(rows)) => Decoded::Command(ScreenCommand::Resize { rows, cols }),
                _ => Decoded::Malformed,
            }
        }
        "eol_clear" => Decoded::Command(ScreenCommand::EolClear),
        "clear" => Decoded::Command(ScreenCommand::Clear),
        "update_fg" => match tuple(tuples, 0).and_then(|fields| nth_i64(fields, 0)) {
            Some(value) => Decoded::Command(ScreenCommand::UpdateForeground(decode_color(value))),
            None => Decoded::Malformed,
        },
        "update_bg" => match tuple(tuples, 0).and_then(|fields| nth_i64(fields, 0)) {
            Some(value) => Decoded::Command(ScreenCommand::UpdateBackground(decode_color(value))),
            None => Decoded::Malformed,
        },
        "mode_change" => {
            let mode = tuple(tuples, 0)
                .and_then(|fields| fields.first())
                .and_then(Value::as_str);
            match mode {
                Some(mode) => Decoded::Command(ScreenCommand::ModeChange(mode.to_string())),
                None => Decoded::Malformed,
            }
        }
        // Input handling is the host's concern; these are acknowledged so
        // they don't show up as unknown.
        "mouse_on" | "mouse_off" => Decoded::Acknowledged,
        _ => Decoded::Unknown,
    }
}

/// Build a highlight from a `highlight_set` attribute map. Missing keys
/// reset their field; every flag is coerced to a strict boolean.
fn decode_highlight(entries: &[(Value, Value)]) -> Highlight {
    let mut highlight = Highlight::default();
    for (key, value) in entries {
        let Some(key) = key.as_str() else { continue };
        match key {
            "bold" => highlight.flags.set(HighlightFlags::BOLD, truthy(value)),
            "italic" => highlight.flags.set(HighlightFlags::ITALIC, truthy(value)),
            "reverse" => highlight.flags.set(HighlightFlags::REVERSE, truthy(value)),
            "underline" => highlight.flags.set(HighlightFlags::UNDERLINE, truthy(value)),
            "undercurl" => highlight.flags.set(HighlightFlags::UNDERCURL, truthy(value)),
            "standout" => highlight.flags.set(HighlightFlags::STANDOUT, truthy(value)),
            "foreground" => highlight.foreground = value.as_i64().and_then(decode_color),
            "background" => highlight.background = value.as_i64().and_then(decode_color),
            _ => {}
        }
    }
    highlight
}

/// Negative values are the "no color" sentinel, never a literal color.
fn decode_color(value: i64) -> Option<Color> {
    if value < 0 {
        None
    } else {
        Some(Color::from_u32(value as u32))
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Boolean(b) => *b,
        Value::Integer(_) => value.as_i64().is_some_and(|n| n != 0),
        _ => false,
    }
}

fn tuple(tuples: &[Value], index: usize) -> Option<&[Value]> {
    match tuples.get(index) {
        Some(Value::Array(fields)) => Some(fields),
        _ => None,
    }
}

fn nth_u16(fields: &[Value], index: usize) -> Option<u16> {
    fields
        .get(index)
        .and_then(Value::as_u64)
        .and_then(|n| u16::try_from(n).ok())
}

fn nth_i64(fields: &[Value], index: usize) -> Option<i64> {
    fields.get(index).and_then(Value::as_i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct RecordingHost {
        calls: Vec<(String, Vec<Value>)>,
    }

    impl PluginHost for RecordingHost {
        fn call(&mut self, method: &str, args: Vec<Value>) {
            self.calls.push((method.to_string(), args));
        }
    }

    fn recording_emitter() -> (ActionEmitter, Rc<RefCell<Vec<UiAction>>>) {
        let actions = Rc::new(RefCell::new(Vec::new()));
        let mut emitter = ActionEmitter::new();
        let sink = actions.clone();
        emitter.subscribe_actions(move |action| sink.borrow_mut().push(action.clone()));
        (emitter, actions)
    }

    fn batch(name: &str, tuples: &[&[Value]]) -> Value {
        let mut items = vec![Value::from(name)];
        for fields in tuples {
            items.push(Value::Array(fields.to_vec()));
        }
        Value::Array(items)
    }

    fn attrs(entries: &[(&str, Value)]) -> Value {
        Value::Map(
            entries
                .iter()
                .map(|(key, value)| (Value::from(*key), value.clone()))
                .collect(),
        )
    }

    fn redraw(decoder: &mut RedrawDecoder, emitter: &mut ActionEmitter, batches: Vec<Value>) {
        let mut host = RecordingHost { calls: Vec::new() };
        decoder.handle_notification(REDRAW_METHOD, &batches, emitter, &mut host);
    }

    #[test]
    fn emission_order_matches_decode_order() {
        let mut decoder = RedrawDecoder::new();
        let (mut emitter, actions) = recording_emitter();

        redraw(
            &mut decoder,
            &mut emitter,
            vec![
                batch("cursor_goto", &[&[Value::from(3u64), Value::from(7u64)]]),
                batch("put", &[&[Value::from("x")]]),
                batch("clear", &[]),
            ],
        );

        let actions = actions.borrow();
        assert_eq!(actions.len(), 3);
        assert_eq!(actions[0], UiAction::CursorGoto { row: 3, col: 7 });
        assert!(matches!(&actions[1], UiAction::Put { text, .. } if text == "x"));
        assert_eq!(actions[2], UiAction::Clear);
    }

    #[test]
    fn put_batch_concatenates_into_one_action() {
        let mut decoder = RedrawDecoder::new();
        let (mut emitter, actions) = recording_emitter();

        redraw(
            &mut decoder,
            &mut emitter,
            vec![batch(
                "put",
                &[
                    &[Value::from("h")],
                    &[Value::from("i")],
                    &[Value::from("!")],
                ],
            )],
        );

        let actions = actions.borrow();
        assert_eq!(actions.len(), 1);
        assert!(matches!(&actions[0], UiAction::Put { text, .. } if text == "hi!"));
    }

    #[test]
    fn highlight_set_last_tuple_wins_without_merging() {
        let mut decoder = RedrawDecoder::new();
        let (mut emitter, actions) = recording_emitter();

        redraw(
            &mut decoder,
            &mut emitter,
            vec![batch(
                "highlight_set",
                &[
                    &[attrs(&[("bold", Value::from(true))])],
                    &[attrs(&[("italic", Value::from(true))])],
                ],
            )],
        );

        let actions = actions.borrow();
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            UiAction::SetHighlight(highlight) => {
                assert!(highlight.italic());
                assert!(!highlight.bold());
            }
            other => panic!("unexpected action: {other:?}"),
        }
    }

    #[test]
    fn highlight_then_put_scenario() {
        let mut decoder = RedrawDecoder::new();
        let (mut emitter, actions) = recording_emitter();

        redraw(
            &mut decoder,
            &mut emitter,
            vec![
                batch("highlight_set", &[&[attrs(&[("bold", Value::from(false))])]]),
                batch("highlight_set", &[&[attrs(&[("bold", Value::from(true))])]]),
                batch("put", &[&[Value::from("a")], &[Value::from("b")]]),
            ],
        );

        let actions = actions.borrow();
        assert_eq!(actions.len(), 3);
        assert!(matches!(&actions[0], UiAction::SetHighlight(h) if !h.bold()));
        assert!(matches!(&actions[1], UiAction::SetHighlight(h) if h.bold()));
        match &actions[2] {
            UiAction::Put { text, highlight } => {
                assert_eq!(text, "ab");
                assert!(highlight.bold());
            }
            other => panic!("unexpected action: {other:?}"),
        }
        assert!(decoder.highlight.current().bold());
    }

    #[test]
    fn plugin_channel_is_forwarded_with_method_stripped() {
        let mut decoder = RedrawDecoder::new();
        let (mut emitter, actions) = recording_emitter();
        let mut host = RecordingHost { calls: Vec::new() };

        let payload = vec![Value::Array(vec![
            Value::from("pluginMethod"),
            Value::from("x"),
            Value::from("y"),
        ])];
        decoder.handle_notification(PLUGIN_METHOD, &payload, &mut emitter, &mut host);

        assert_eq!(actions.borrow().len(), 0);
        assert_eq!(host.calls.len(), 1);
        assert_eq!(host.calls[0].0, "pluginMethod");
        assert_eq!(host.calls[0].1, vec![Value::from("x"), Value::from("y")]);
    }

    #[test]
    fn unknown_command_does_not_abort_siblings() {
        let mut decoder = RedrawDecoder::new();
        let (mut emitter, actions) = recording_emitter();

        redraw(
            &mut decoder,
            &mut emitter,
            vec![
                batch("definitely_not_a_command", &[&[Value::from(1u64)]]),
                batch("clear", &[]),
            ],
        );

        let actions = actions.borrow();
        assert_eq!(*actions, vec![UiAction::Clear]);
    }

    #[test]
    fn unknown_notification_method_produces_no_actions() {
        let mut decoder = RedrawDecoder::new();
        let (mut emitter, actions) = recording_emitter();
        let mut host = RecordingHost { calls: Vec::new() };

        decoder.handle_notification("some_other_channel", &[], &mut emitter, &mut host);

        assert!(actions.borrow().is_empty());
        assert!(host.calls.is_empty());
    }

    #[test]
    fn no_actions_after_shutdown() {
        let mut decoder = RedrawDecoder::new();
        let (mut emitter, actions) = recording_emitter();

        decoder.shutdown();
        redraw(&mut decoder, &mut emitter, vec![batch("clear", &[])]);

        assert!(actions.borrow().is_empty());
    }

    #[test]
    fn resize_notification_order_is_cols_then_rows() {
        let mut decoder = RedrawDecoder::new();
        let (mut emitter, actions) = recording_emitter();

        redraw(
            &mut decoder,
            &mut emitter,
            vec![batch("resize", &[&[Value::from(80u64), Value::from(40u64)]])],
        );

        assert_eq!(
            *actions.borrow(),
            vec![UiAction::Resize { rows: 40, cols: 80 }]
        );
    }

    #[test]
    fn color_sentinel_decodes_to_unset() {
        let mut decoder = RedrawDecoder::new();
        let (mut emitter, actions) = recording_emitter();

        redraw(
            &mut decoder,
            &mut emitter,
            vec![
                batch("update_fg", &[&[Value::from(0xff0000i64)]]),
                batch("update_bg", &[&[Value::from(-1i64)]]),
            ],
        );

        let actions = actions.borrow();
        assert_eq!(
            actions[0],
            UiAction::SetForeground(Some(Color::new(0xff, 0, 0)))
        );
        assert_eq!(actions[1], UiAction::SetBackground(None));
    }

    #[test]
    fn mode_change_emits_action_and_signal() {
        let mut decoder = RedrawDecoder::new();
        let (mut emitter, actions) = recording_emitter();
        let modes = Rc::new(RefCell::new(Vec::new()));
        let sink = modes.clone();
        emitter.subscribe_modes(move |mode| sink.borrow_mut().push(mode.to_string()));

        redraw(
            &mut decoder,
            &mut emitter,
            vec![batch("mode_change", &[&[Value::from("insert")]])],
        );

        assert_eq!(
            *actions.borrow(),
            vec![UiAction::ModeChange("insert".to_string())]
        );
        assert_eq!(*modes.borrow(), vec!["insert".to_string()]);
    }

    #[test]
    fn mouse_toggles_are_silent_no_ops() {
        let mut decoder = RedrawDecoder::new();
        let (mut emitter, actions) = recording_emitter();

        redraw(
            &mut decoder,
            &mut emitter,
            vec![batch("mouse_on", &[]), batch("mouse_off", &[])],
        );

        assert!(actions.borrow().is_empty());
    }

    #[test]
    fn integer_attribute_values_are_coerced_to_booleans() {
        let mut decoder = RedrawDecoder::new();
        let (mut emitter, actions) = recording_emitter();

        redraw(
            &mut decoder,
            &mut emitter,
            vec![batch(
                "highlight_set",
                &[&[attrs(&[
                    ("underline", Value::from(1u64)),
                    ("undercurl", Value::from(0u64)),
                    ("foreground", Value::from(0x00ff00i64)),
                ])]],
            )],
        );

        match &actions.borrow()[0] {
            UiAction::SetHighlight(highlight) => {
                assert!(highlight.underline());
                assert!(!highlight.undercurl());
                assert_eq!(highlight.foreground, Some(Color::new(0, 0xff, 0)));
            }
            other => panic!("unexpected action: {other:?}"),
        };
    }
}
