// Ordering guarantees of the dispatch loop under concurrent producers.

use std::collections::HashMap;

use futures::stream;
use rivulet::{element::Text, prelude::*};
use tokio::time::{Duration, sleep, timeout};

const PRODUCERS: usize = 8;
const PER_PRODUCER: usize = 100;

#[derive(Debug, Clone)]
enum Message {
    Push { producer: usize, seq: usize },
    Spawn,
    Got(&'static str),
}

#[derive(Debug, Clone, Default)]
struct Log {
    applied: usize,
    last_seq: HashMap<usize, usize>,
    got: Vec<&'static str>,
    interleaved: bool,
}

struct Ordered {
    quit_after: usize,
}

impl Application for Ordered {
    type State = Log;
    type Message = Message;

    fn init(&self) -> (Log, Command<Message>) {
        (Log::default(), Command::none())
    }

    fn update(&self, state: &Log, msg: Message) -> (Log, Command<Message>) {
        let mut next = state.clone();
        next.applied += 1;

        let cmd = match msg {
            Message::Push { producer, seq } => {
                if state.last_seq.get(&producer).is_some_and(|&last| last >= seq) {
                    next.interleaved = true;
                }
                next.last_seq.insert(producer, seq);
                Command::none()
            }
            Message::Spawn => Command::batch(vec![
                Command::perform(
                    async {
                        sleep(Duration::from_millis(20)).await;
                        "slow"
                    },
                    Message::Got,
                ),
                Command::perform(async { "fast" }, Message::Got),
                Command::none(),
            ]),
            Message::Got(label) => {
                next.got.push(label);
                Command::none()
            }
        };

        if next.applied >= self.quit_after {
            (next, Command::batch(vec![cmd, Command::effect(Action::Quit)]))
        } else {
            (next, cmd)
        }
    }

    fn view(&self, state: &Log, _dispatch: &Dispatch<Message>) -> Element {
        Text::new(state.applied.to_string()).into()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_producers_are_serialized() {
    let recorder = Recorder::new();
    let runtime = Runtime::new(
        Ordered {
            quit_after: PRODUCERS * PER_PRODUCER,
        },
        recorder.clone(),
    );
    let dispatch = runtime.dispatcher();
    let task = tokio::spawn(runtime.run());

    let producers: Vec<_> = (0..PRODUCERS)
        .map(|producer| {
            let dispatch = dispatch.clone();
            std::thread::spawn(move || {
                for seq in 0..PER_PRODUCER {
                    dispatch.dispatch(Message::Push { producer, seq }).unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    let log = timeout(Duration::from_secs(5), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(log.applied, PRODUCERS * PER_PRODUCER);
    assert!(!log.interleaved, "each producer's messages must apply in order");
    assert_eq!(recorder.len(), PRODUCERS * PER_PRODUCER + 1);
}

#[tokio::test]
async fn test_second_message_sees_first_committed() {
    let recorder = Recorder::new();
    let mut runtime = Runtime::new(Ordered { quit_after: usize::MAX }, recorder.clone());
    let dispatch = runtime.dispatcher();
    runtime.start().await.unwrap();

    dispatch.dispatch(Message::Push { producer: 0, seq: 0 }).unwrap();
    dispatch.dispatch(Message::Push { producer: 0, seq: 1 }).unwrap();

    runtime.step().await.unwrap();
    assert_eq!(runtime.state().map(|log| log.applied), Some(1));
    assert_eq!(recorder.last().as_ref().and_then(Element::text), Some("1"));

    runtime.step().await.unwrap();
    assert_eq!(runtime.state().map(|log| log.applied), Some(2));
    assert_eq!(runtime.state().map(|log| log.interleaved), Some(false));
}

#[tokio::test]
async fn test_batch_messages_each_arrive_once() {
    let recorder = Recorder::new();
    let runtime = Runtime::new(Ordered { quit_after: 3 }, recorder.clone());
    runtime.handle().dispatch(Message::Spawn).unwrap();

    let log = timeout(Duration::from_secs(1), runtime.run())
        .await
        .unwrap()
        .unwrap();

    let mut got = log.got.clone();
    got.sort_unstable();
    assert_eq!(got, vec!["fast", "slow"]);
}

#[tokio::test]
async fn test_none_command_emits_nothing() {
    let (dispatch, mut inbox) = Dispatch::<Message>::channel();

    let done = Command::none().execute(dispatch).await;

    assert_eq!(done.emitted, 0);
    assert!(inbox.try_next().is_none());
}

#[tokio::test]
async fn test_stream_command_preserves_order() {
    let (dispatch, mut inbox) = Dispatch::channel();

    let done = Command::run(stream::iter(["a", "b", "c"]), Message::Got)
        .execute(dispatch)
        .await;

    assert_eq!(done.emitted, 3);
    let labels: Vec<_> = inbox
        .drain()
        .into_iter()
        .filter_map(|msg| match msg {
            Message::Got(label) => Some(label),
            _ => None,
        })
        .collect();
    assert_eq!(labels, vec!["a", "b", "c"]);
}
