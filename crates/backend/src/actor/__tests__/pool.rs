//! Round-robin pool tests.

#[cfg(test)]
mod tests {
  use std::{
    sync::{Arc, Mutex},
    time::Duration,
  };

  use async_trait::async_trait;
  use pretty_assertions::assert_eq;

  use crate::actor::{
    __tests__::helpers::{Event, Events, Recorder},
    handle::Mailbox,
    mailbox::Handler,
    message::StopPriority,
    pool,
    registry::Registry,
  };

  #[tokio::test]
  async fn test_payload_i_goes_to_worker_i_mod_k() {
    let registry = Registry::new();
    let mut logs: Vec<Events<u32>> = Vec::new();
    let coordinator = pool::spawn(&registry, 3, "pool", |_| {
      let (recorder, events) = Recorder::new();
      logs.push(events);
      recorder
    });

    for i in 0..10 {
      coordinator.post(i).unwrap();
    }
    coordinator.stop(StopPriority::Drain).await;

    assert_eq!(logs.len(), 3);
    assert_eq!(logs[0].handled(), vec![0, 3, 6, 9]);
    assert_eq!(logs[1].handled(), vec![1, 4, 7]);
    assert_eq!(logs[2].handled(), vec![2, 5, 8]);
  }

  #[tokio::test]
  async fn test_drain_waits_for_busy_workers() {
    let registry = Registry::new();
    let mut logs: Vec<Events<u32>> = Vec::new();
    let coordinator = pool::spawn(&registry, 2, "slow-pool", |_| {
      let (recorder, events) = Recorder::with_delay(Duration::from_millis(10));
      logs.push(events);
      recorder
    });

    for i in 0..8 {
      coordinator.post(i).unwrap();
    }
    coordinator.stop(StopPriority::Drain).await;

    for log in &logs {
      assert_eq!(log.handled().len(), 4);
      assert_eq!(log.stops(), vec![StopPriority::Drain]);
    }
    assert_eq!(registry.in_flight().count(), 0);
  }

  #[tokio::test]
  async fn test_zero_workers_means_one() {
    let registry = Registry::new();
    let mut logs: Vec<Events<u32>> = Vec::new();
    let coordinator = pool::spawn(&registry, 0, "tiny", |_| {
      let (recorder, events) = Recorder::new();
      logs.push(events);
      recorder
    });

    coordinator.post(1).unwrap();
    coordinator.post(2).unwrap();
    coordinator.stop(StopPriority::Drain).await;

    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].handled(), vec![1, 2]);
  }

  #[tokio::test]
  async fn test_immediate_stop_propagates_to_workers() {
    let registry = Registry::new();
    let mut logs: Vec<Events<u32>> = Vec::new();
    let coordinator = pool::spawn(&registry, 2, "pool", |_| {
      let (recorder, events) = Recorder::new();
      logs.push(events);
      recorder
    });

    coordinator.stop(StopPriority::Immediate).await;

    for log in &logs {
      assert_eq!(log.stops(), vec![StopPriority::Immediate]);
    }
    assert!(coordinator.post(1).is_err());
  }

  /// Records the index of each worker as it stops
  struct StopOrder {
    index: usize,
    order: Arc<Mutex<Vec<usize>>>,
  }

  #[async_trait]
  impl Handler for StopOrder {
    type Payload = ();
    type Error = String;

    async fn handle(&mut self, _mailbox: &Mailbox<()>, _payload: ()) -> Result<(), String> {
      Ok(())
    }

    async fn on_stop(&mut self, _mailbox: &Mailbox<()>, _priority: StopPriority) -> Result<(), String> {
      // Give a concurrent stop the chance to interleave if there was one
      tokio::time::sleep(Duration::from_millis(2)).await;
      self.order.lock().unwrap().push(self.index);
      Ok(())
    }
  }

  #[tokio::test]
  async fn test_workers_stop_in_index_order() {
    let registry = Registry::new();
    let order = Arc::new(Mutex::new(Vec::new()));
    let coordinator = pool::spawn(&registry, 4, "ordered", |index| StopOrder {
      index,
      order: order.clone(),
    });

    coordinator.stop(StopPriority::Drain).await;

    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3]);
  }

  #[tokio::test]
  async fn test_registered_pool_receives_dispatches() {
    let registry = Registry::new();
    let mut logs: Vec<Events<String>> = Vec::new();
    let coordinator = pool::spawn_registered(&registry, 2, "words", |_| {
      let (recorder, events) = Recorder::new();
      logs.push(events);
      recorder
    })
    .unwrap();

    registry.dispatch("cat".to_string()).unwrap();
    registry.dispatch("dog".to_string()).unwrap();
    coordinator.stop(StopPriority::Drain).await;

    assert_eq!(logs[0].handled(), vec!["cat"]);
    assert_eq!(logs[1].handled(), vec!["dog"]);
    assert!(registry.dispatch("eel".to_string()).is_err());
  }

  #[tokio::test]
  async fn test_flush_reaches_every_worker() {
    let registry = Registry::new();
    let mut logs: Vec<Events<u32>> = Vec::new();
    let coordinator = pool::spawn(&registry, 3, "pool", |_| {
      let (recorder, events) = Recorder::new();
      logs.push(events);
      recorder
    });

    coordinator.post(0).unwrap();
    coordinator.flush().unwrap();
    registry.in_flight().wait_idle().await;

    assert_eq!(logs.iter().map(|l| l.flushes()).collect::<Vec<_>>(), vec![1, 1, 1]);
    assert_eq!(logs[0].snapshot(), vec![Event::Handled(0), Event::Flushed]);
    coordinator.stop(StopPriority::Drain).await;
  }

  #[tokio::test]
  async fn test_immediate_request_interrupts_pool_drain() {
    let registry = Registry::new();
    let mut logs: Vec<Events<u32>> = Vec::new();
    let coordinator = pool::spawn(&registry, 2, "pool", |_| {
      let (recorder, events) = Recorder::new();
      logs.push(events);
      recorder
    });

    coordinator.post(0).unwrap();
    coordinator.post(1).unwrap();
    coordinator.request_stop(StopPriority::Drain);
    coordinator.request_stop(StopPriority::Immediate);
    coordinator.post(2).unwrap();
    coordinator.post(3).unwrap();
    coordinator.stopped().await;

    assert_eq!(logs[0].handled(), vec![0]);
    assert_eq!(logs[1].handled(), vec![1]);
    for log in &logs {
      assert_eq!(log.stops(), vec![StopPriority::Drain]);
    }
    assert_eq!(coordinator.dropped(), 2);
    assert_eq!(registry.in_flight().count(), 0);
  }
}
