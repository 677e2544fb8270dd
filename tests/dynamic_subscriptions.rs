// Tests for subscriptions that start and stop as the state changes.

use std::{task::Poll, time::Duration};

use futures::stream::{self, BoxStream, StreamExt};
use rivulet::{
    element::Text,
    prelude::*,
    subscription::{SubscriptionId, SubscriptionSource, mock::MockSource, time::Every},
};
use tokio::time::{sleep, timeout};

#[derive(Debug, Clone)]
enum Message {
    Value(i32),
    Tick,
    Listen(bool),
    Timer(bool),
    Broken,
    Flaky,
}

#[derive(Debug, Clone, Default)]
struct State {
    values: Vec<i32>,
    ticks: usize,
    listening: bool,
    timer: bool,
    broken: bool,
    flaky: bool,
}

struct Listener {
    source: MockSource<i32>,
}

struct BrokenSource;

impl SubscriptionSource for BrokenSource {
    type Output = i32;

    fn stream(&self) -> BoxStream<'static, i32> {
        panic!("device unavailable")
    }

    fn id(&self) -> SubscriptionId {
        SubscriptionId::of::<Self>(0)
    }
}

struct FlakySource;

impl SubscriptionSource for FlakySource {
    type Output = i32;

    fn stream(&self) -> BoxStream<'static, i32> {
        stream::poll_fn(|_| -> Poll<Option<i32>> { panic!("sensor disconnected") }).boxed()
    }

    fn id(&self) -> SubscriptionId {
        SubscriptionId::of::<Self>(0)
    }
}

impl Application for Listener {
    type State = State;
    type Message = Message;

    fn init(&self) -> (State, Command<Message>) {
        (
            State {
                listening: true,
                ..State::default()
            },
            Command::none(),
        )
    }

    fn update(&self, state: &State, msg: Message) -> (State, Command<Message>) {
        let mut next = state.clone();
        match msg {
            Message::Value(n) => next.values.push(n),
            Message::Tick => next.ticks += 1,
            Message::Listen(on) => next.listening = on,
            Message::Timer(on) => next.timer = on,
            Message::Broken => next.broken = true,
            Message::Flaky => next.flaky = true,
        }
        (next, Command::none())
    }

    fn view(&self, state: &State, _dispatch: &Dispatch<Message>) -> Element {
        Text::new(format!("{:?}", state.values)).into()
    }

    fn subscriptions(&self, state: &State) -> Vec<Subscription<Message>> {
        let mut subs = Vec::new();
        if state.listening {
            subs.push(Subscription::new(self.source.clone()).map(Message::Value));
        }
        if state.timer {
            subs.push(Subscription::new(Every::new(Duration::from_millis(10))).map(|_| Message::Tick));
        }
        if state.broken {
            subs.push(Subscription::new(BrokenSource).map(Message::Value));
        }
        if state.flaky {
            subs.push(Subscription::new(FlakySource).map(Message::Value));
        }
        subs
    }
}

async fn settle() {
    sleep(Duration::from_millis(20)).await;
}

fn listener() -> (Runtime<Listener, Recorder>, MockSource<i32>) {
    let source = MockSource::new();
    let runtime = Runtime::new(
        Listener {
            source: source.clone(),
        },
        Recorder::new(),
    );
    (runtime, source)
}

#[tokio::test]
async fn test_subscription_messages_reach_update() {
    let (mut runtime, source) = listener();
    runtime.start().await.unwrap();
    settle().await;

    source.emit(1).unwrap();
    source.emit(2).unwrap();
    for _ in 0..2 {
        timeout(Duration::from_secs(1), runtime.step()).await.unwrap().unwrap();
    }

    assert_eq!(runtime.state().map(|s| s.values.clone()), Some(vec![1, 2]));
}

#[tokio::test]
async fn test_stopped_subscription_dispatches_nothing() {
    let (mut runtime, source) = listener();
    let handle = runtime.handle();
    runtime.start().await.unwrap();
    assert!(runtime.is_subscribed(source.id()));

    handle.dispatch(Message::Listen(false)).unwrap();
    runtime.step().await.unwrap();
    assert!(!runtime.is_subscribed(source.id()));
    assert_eq!(source.receiver_count(), 0);

    // Nobody is listening any more
    assert!(source.emit(99).is_err());
    handle.dispatch(Message::Listen(true)).unwrap();
    runtime.step().await.unwrap();
    settle().await;

    source.emit(3).unwrap();
    timeout(Duration::from_secs(1), runtime.step()).await.unwrap().unwrap();
    assert_eq!(runtime.state().map(|s| s.values.clone()), Some(vec![3]));
}

#[tokio::test]
async fn test_unchanged_subscription_survives_renders() {
    let (mut runtime, source) = listener();
    let handle = runtime.handle();
    runtime.start().await.unwrap();
    settle().await;

    for on in [false, true] {
        handle.dispatch(Message::Timer(on)).unwrap();
        runtime.step().await.unwrap();
    }

    // The mock was requested on every render and never restarted
    assert_eq!(source.receiver_count(), 1);
    assert_eq!(runtime.active_subscriptions(), 2);
}

#[tokio::test]
async fn test_timer_ticks_until_disabled() {
    let (mut runtime, _source) = listener();
    let handle = runtime.handle();
    runtime.start().await.unwrap();

    handle.dispatch(Message::Timer(true)).unwrap();
    runtime.step().await.unwrap();

    for _ in 0..3 {
        timeout(Duration::from_secs(1), runtime.step()).await.unwrap().unwrap();
    }
    let ticks = runtime.state().map_or(0, |s| s.ticks);
    assert_eq!(ticks, 3);

    handle.dispatch(Message::Timer(false)).unwrap();
    // Ticks queued before the stop are dropped; the stop message applies in order
    while runtime.state().is_some_and(|s| s.timer) {
        timeout(Duration::from_secs(1), runtime.step()).await.unwrap().unwrap();
    }
    let ticks = runtime.state().map_or(0, |s| s.ticks);

    sleep(Duration::from_millis(50)).await;
    assert!(!runtime.is_subscribed(Every::new(Duration::from_millis(10)).id()));

    handle.dispatch(Message::Listen(true)).unwrap();
    runtime.step().await.unwrap();
    assert_eq!(runtime.state().map(|s| s.ticks), Some(ticks));
}

#[tokio::test]
async fn test_start_failure_is_reported_not_fatal() {
    let (mut runtime, source) = listener();
    let mut failures = runtime.failures().unwrap();
    assert!(runtime.failures().is_none());
    let handle = runtime.handle();
    runtime.start().await.unwrap();

    handle.dispatch(Message::Broken).unwrap();
    runtime.step().await.unwrap();

    let failure = timeout(Duration::from_secs(1), failures.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        failure,
        Failure::SubscriptionStart { ref reason, .. } if reason == "device unavailable"
    ));
    assert!(!runtime.is_subscribed(BrokenSource.id()));
    assert_eq!(runtime.phase(), Phase::Running);

    // The loop keeps going
    settle().await;
    source.emit(5).unwrap();
    timeout(Duration::from_secs(1), runtime.step()).await.unwrap().unwrap();
    assert_eq!(runtime.state().map(|s| s.values.clone()), Some(vec![5]));
}

#[tokio::test]
async fn test_shutdown_stops_every_subscription() {
    let (mut runtime, source) = listener();
    let handle = runtime.handle();
    runtime.start().await.unwrap();
    handle.dispatch(Message::Timer(true)).unwrap();
    runtime.step().await.unwrap();
    assert_eq!(runtime.active_subscriptions(), 2);

    runtime.shutdown().await.unwrap();

    assert_eq!(runtime.active_subscriptions(), 0);
    assert_eq!(source.receiver_count(), 0);
}

#[tokio::test]
async fn test_panicking_source_is_reported_and_forgotten() {
    let (mut runtime, source) = listener();
    let mut failures = runtime.failures().unwrap();
    let handle = runtime.handle();
    runtime.start().await.unwrap();

    handle.dispatch(Message::Flaky).unwrap();
    runtime.step().await.unwrap();
    assert!(runtime.is_subscribed(FlakySource.id()));

    // The panic reaches the loop as a failure of that instance
    timeout(Duration::from_secs(1), runtime.step()).await.unwrap().unwrap();

    let failure = failures.try_recv().unwrap();
    assert!(matches!(
        failure,
        Failure::SubscriptionPanicked { ref reason, .. } if reason == "sensor disconnected"
    ));
    assert!(!runtime.is_subscribed(FlakySource.id()));
    assert_eq!(runtime.active_subscriptions(), 1);
    assert_eq!(runtime.phase(), Phase::Running);

    // Other subscriptions keep delivering
    settle().await;
    source.emit(7).unwrap();
    timeout(Duration::from_secs(1), runtime.step()).await.unwrap().unwrap();
    assert_eq!(runtime.state().map(|s| s.values.clone()), Some(vec![7]));
}
