//! Mailbox processor tests: ordering, drain and immediate stop, failure
//! containment.

#[cfg(test)]
mod tests {
  use std::{sync::Arc, time::Duration};

  use async_trait::async_trait;
  use pretty_assertions::assert_eq;
  use tokio::sync::Semaphore;

  use crate::actor::{
    __tests__::helpers::{Event, Events, Recorder},
    handle::{Mailbox, SendError},
    mailbox::{Handler, spawn, spawn_registered},
    message::StopPriority,
    registry::{DispatchError, Registry},
  };

  /// Handles `n` by recording it and posting `n - 1` to itself
  struct Countdown {
    seen: Arc<std::sync::Mutex<Vec<u32>>>,
  }

  #[async_trait]
  impl Handler for Countdown {
    type Payload = u32;
    type Error = String;

    async fn handle(&mut self, mailbox: &Mailbox<u32>, n: u32) -> Result<(), String> {
      self.seen.lock().unwrap().push(n);
      if n > 0 {
        mailbox.post(n - 1).map_err(|e| e.to_string())?;
      }
      Ok(())
    }
  }

  #[tokio::test]
  async fn test_drain_handles_everything_before_stop_callback() {
    let registry = Registry::new();
    let (recorder, events) = Recorder::<u32>::new();
    let mailbox = spawn(&registry, "numbers", recorder);

    for i in 0..50 {
      mailbox.post(i).unwrap();
    }
    mailbox.stop(StopPriority::Drain).await;

    let mut expected: Vec<Event<u32>> = (0..50).map(Event::Handled).collect();
    expected.push(Event::Stopped(StopPriority::Drain));
    assert_eq!(events.snapshot(), expected);
    assert_eq!(mailbox.pending(), 0);
    assert_eq!(mailbox.dropped(), 0);
  }

  #[tokio::test]
  async fn test_drain_includes_work_posted_while_draining() {
    let registry = Registry::new();
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let mailbox = spawn(&registry, "countdown", Countdown { seen: seen.clone() });

    mailbox.post(5).unwrap();
    mailbox.stop(StopPriority::Drain).await;

    assert_eq!(*seen.lock().unwrap(), vec![5, 4, 3, 2, 1, 0]);
    assert_eq!(registry.in_flight().count(), 0);
  }

  #[tokio::test]
  async fn test_immediate_stop_skips_messages_posted_after_request() {
    let registry = Registry::new();
    let gate = Arc::new(Semaphore::new(0));
    let (recorder, events) = Recorder::<u32>::gated(gate.clone());
    let mailbox = spawn(&registry, "gated", recorder);

    mailbox.post(1).unwrap();
    mailbox.request_stop(StopPriority::Immediate);
    // Still accepted: the inbox only closes once the stop is processed
    mailbox.post(2).unwrap();
    mailbox.post(3).unwrap();

    gate.add_permits(10);
    mailbox.stopped().await;

    assert_eq!(
      events.snapshot(),
      vec![Event::Handled(1), Event::Stopped(StopPriority::Immediate)]
    );
    assert_eq!(mailbox.dropped(), 2);
    assert_eq!(registry.in_flight().dropped(), 2);
    assert_eq!(registry.in_flight().count(), 0);
  }

  #[tokio::test]
  async fn test_immediate_stop_waits_for_current_handler() {
    let registry = Registry::new();
    let (recorder, events) = Recorder::<u32>::with_delay(Duration::from_millis(50));
    let mailbox = spawn(&registry, "slow", recorder);

    mailbox.post(1).unwrap();
    // Let the handler pick up the first payload
    tokio::time::sleep(Duration::from_millis(10)).await;
    mailbox.stop(StopPriority::Immediate).await;

    assert_eq!(
      events.snapshot(),
      vec![Event::Handled(1), Event::Stopped(StopPriority::Immediate)]
    );
  }

  #[tokio::test]
  async fn test_handler_errors_and_panics_do_not_kill_mailbox() {
    fn check(n: &u32) -> Result<(), String> {
      match n {
        2 => Err("two is not allowed".to_string()),
        3 => panic!("three is right out"),
        _ => Ok(()),
      }
    }

    let registry = Registry::new();
    let (recorder, events) = Recorder::<u32>::checked(check);
    let mailbox = spawn(&registry, "fragile", recorder);

    for i in 1..=4 {
      mailbox.post(i).unwrap();
    }
    mailbox.stop(StopPriority::Drain).await;

    assert_eq!(events.handled(), vec![1, 4]);
    assert_eq!(events.stops(), vec![StopPriority::Drain]);
    assert_eq!(mailbox.pending(), 0);
  }

  #[tokio::test]
  async fn test_stop_is_idempotent() {
    let registry = Registry::new();
    let (recorder, events) = Recorder::<u32>::new();
    let mailbox = spawn(&registry, "once", recorder);

    mailbox.stop(StopPriority::Drain).await;
    mailbox.stop(StopPriority::Drain).await;
    mailbox.stop(StopPriority::Immediate).await;

    assert!(mailbox.is_stopped());
    assert_eq!(events.stops(), vec![StopPriority::Drain]);
  }

  #[tokio::test]
  async fn test_post_after_stop_fails() {
    let registry = Registry::new();
    let (recorder, events): (_, Events<u32>) = Recorder::new();
    let mailbox = spawn(&registry, "closed", recorder);
    mailbox.stop(StopPriority::Drain).await;

    let err = mailbox.post(1).unwrap_err();
    assert!(matches!(err, SendError::ActorGone(ref name) if name == "closed"));
    assert!(events.handled().is_empty());
    assert_eq!(mailbox.pending(), 0);
  }

  #[tokio::test]
  async fn test_handles_in_post_order_across_clones() {
    let registry = Registry::new();
    let (recorder, events) = Recorder::<u32>::new();
    let mailbox = spawn(&registry, "ordered", recorder);
    let other = mailbox.clone();

    mailbox.post(1).unwrap();
    other.post(2).unwrap();
    mailbox.post(3).unwrap();
    other.stop(StopPriority::Drain).await;

    assert_eq!(events.handled(), vec![1, 2, 3]);
    assert!(mailbox.is_stopped());
  }

  #[tokio::test]
  async fn test_spawn_registered_rejects_duplicate_route() {
    let registry = Registry::new();
    let (first, _) = Recorder::<u32>::new();
    let (second, second_events) = Recorder::<u32>::new();

    let first = spawn_registered(&registry, "first", first).unwrap();
    let err = spawn_registered(&registry, "second", second).unwrap_err();
    assert!(matches!(err, DispatchError::Duplicate { .. }));

    registry.dispatch(7u32).unwrap();
    first.stop(StopPriority::Drain).await;

    // The rejected mailbox was stopped without handling anything
    tokio::time::timeout(Duration::from_secs(5), async {
      while second_events.stops().is_empty() {
        tokio::time::sleep(Duration::from_millis(5)).await;
      }
    })
    .await
    .expect("rejected mailbox should stop");
    assert!(second_events.handled().is_empty());
  }

  #[tokio::test]
  async fn test_flush_runs_in_post_order_and_counts_as_in_flight() {
    let registry = Registry::new();
    let (recorder, events) = Recorder::<u32>::new();
    let mailbox = spawn(&registry, "flushing", recorder);

    mailbox.post(1).unwrap();
    mailbox.flush().unwrap();
    mailbox.post(2).unwrap();
    registry.in_flight().wait_idle().await;

    assert_eq!(
      events.snapshot(),
      vec![Event::Handled(1), Event::Flushed, Event::Handled(2)]
    );

    mailbox.stop(StopPriority::Drain).await;
    assert!(mailbox.flush().is_err());
    assert_eq!(registry.in_flight().count(), 0);
  }

  #[tokio::test]
  async fn test_immediate_request_cuts_drain_short() {
    let registry = Registry::new();
    let (recorder, events) = Recorder::<u32>::new();
    let mailbox = spawn(&registry, "escalated", recorder);

    mailbox.post(1).unwrap();
    mailbox.request_stop(StopPriority::Drain);
    mailbox.post(2).unwrap();
    mailbox.request_stop(StopPriority::Immediate);
    mailbox.post(3).unwrap();
    mailbox.stopped().await;

    assert_eq!(
      events.snapshot(),
      vec![
        Event::Handled(1),
        Event::Handled(2),
        Event::Stopped(StopPriority::Drain)
      ]
    );
    assert_eq!(mailbox.dropped(), 1);
    assert_eq!(registry.in_flight().count(), 0);
  }
}
