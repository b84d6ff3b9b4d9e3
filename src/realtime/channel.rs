use super::protocol::{
    decode_frame, heartbeat_message, join_message, leave_message, ChannelEvent, PhoenixMessage,
};
use crate::api::{ApiError, ApiResult};
use crate::gateway::{ChangeHandler, Subscription};
use leptos::logging::{error, log, warn};
use leptos_dom::helpers::{set_interval_with_handle, IntervalHandle};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{CloseEvent, Event, MessageEvent, WebSocket};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(25);
const JOIN_REF: &str = "1";

/// Message refs are per-socket and only need to be unique.
#[derive(Clone)]
struct RefCounter(Rc<Cell<u64>>);

impl RefCounter {
    fn new() -> Self {
        // "1" is taken by the join.
        Self(Rc::new(Cell::new(1)))
    }

    fn next(&self) -> String {
        let n = self.0.get() + 1;
        self.0.set(n);
        n.to_string()
    }
}

fn send(socket: &WebSocket, msg: &PhoenixMessage) {
    if socket.ready_state() != WebSocket::OPEN {
        return;
    }
    match serde_json::to_string(msg) {
        Ok(text) => {
            if let Err(e) = socket.send_with_str(&text) {
                warn!("Realtime send failed: {e:?}");
            }
        }
        Err(e) => warn!("Realtime encode failed: {e}"),
    }
}

/// One websocket carrying one channel for one owner.
///
/// Failures after the socket opens are logged only; there is no automatic
/// reconnect. Dropping the subscription tears it down the same way `cancel`
/// does.
pub(crate) struct RealtimeSubscription {
    socket: WebSocket,
    refs: RefCounter,
    heartbeat: Option<IntervalHandle>,
    closed: bool,

    // Kept alive for as long as the socket may call them.
    _on_open: Closure<dyn FnMut(Event)>,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_error: Closure<dyn FnMut(Event)>,
    _on_close: Closure<dyn FnMut(CloseEvent)>,
}

impl RealtimeSubscription {
    pub(crate) fn open(
        url: &str,
        owner_id: &str,
        access_token: &str,
        on_change: ChangeHandler,
    ) -> ApiResult<Self> {
        let socket = WebSocket::new(url)
            .map_err(|e| ApiError::realtime(format!("Unable to open realtime socket: {e:?}")))?;
        let refs = RefCounter::new();

        let join = join_message(owner_id, access_token, JOIN_REF);
        let s2 = socket.clone();
        let on_open = Closure::wrap(Box::new(move |_ev: Event| {
            send(&s2, &join);
        }) as Box<dyn FnMut(Event)>);

        let on_message = Closure::wrap(Box::new(move |ev: MessageEvent| {
            let Some(text) = ev.data().as_string() else {
                return;
            };
            match decode_frame(&text) {
                Ok(ChannelEvent::Change(change)) => on_change(change),
                Ok(ChannelEvent::Joined) => log!("Realtime status: SUBSCRIBED"),
                Ok(ChannelEvent::JoinFailed(reason)) => {
                    error!("Realtime error: join rejected: {reason}")
                }
                Ok(ChannelEvent::Status(message)) => log!("Realtime status: {message}"),
                Ok(ChannelEvent::Error(message)) => error!("Realtime error: {message}"),
                Ok(ChannelEvent::Closed) => log!("Realtime status: CLOSED"),
                Ok(ChannelEvent::Ignored) => {}
                Err(e) => warn!("Realtime frame dropped: {e}"),
            }
        }) as Box<dyn FnMut(MessageEvent)>);

        let on_error = Closure::wrap(Box::new(move |_ev: Event| {
            error!("Realtime error: websocket error");
        }) as Box<dyn FnMut(Event)>);

        let on_close = Closure::wrap(Box::new(move |ev: CloseEvent| {
            log!("Realtime status: CLOSED ({})", ev.code());
        }) as Box<dyn FnMut(CloseEvent)>);

        socket.set_onopen(Some(on_open.as_ref().unchecked_ref()));
        socket.set_onmessage(Some(on_message.as_ref().unchecked_ref()));
        socket.set_onerror(Some(on_error.as_ref().unchecked_ref()));
        socket.set_onclose(Some(on_close.as_ref().unchecked_ref()));

        let s3 = socket.clone();
        let r2 = refs.clone();
        let heartbeat = set_interval_with_handle(
            move || send(&s3, &heartbeat_message(&r2.next())),
            HEARTBEAT_INTERVAL,
        )
        .map_err(|e| warn!("Realtime heartbeat not scheduled: {e:?}"))
        .ok();

        Ok(Self {
            socket,
            refs,
            heartbeat,
            closed: false,
            _on_open: on_open,
            _on_message: on_message,
            _on_error: on_error,
            _on_close: on_close,
        })
    }

    fn teardown(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        log!("Cleaning up realtime subscription");

        if let Some(h) = self.heartbeat.take() {
            h.clear();
        }

        send(&self.socket, &leave_message(&self.refs.next(), JOIN_REF));

        // Detach first so no handler runs after teardown.
        self.socket.set_onopen(None);
        self.socket.set_onmessage(None);
        self.socket.set_onerror(None);
        self.socket.set_onclose(None);
        let _ = self.socket.close();
    }
}

impl Subscription for RealtimeSubscription {
    fn cancel(mut self) {
        self.teardown();
    }
}

impl Drop for RealtimeSubscription {
    fn drop(&mut self) {
        self.teardown();
    }
}
