use std::time::Duration;

use tracing::info;

use crate::address::UnitIndex;
use crate::bus::CanBus;
use crate::unit::{UnitSession, DEFAULT_REPLY_TIMEOUT};

/// Settings applied to every unit the poller talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Shunt level in mV sent with each query. 0 disables shunting
    pub shunt_mv: u16,
    /// How long the bus must stay quiet before a reply burst is considered complete
    pub reply_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { shunt_mv: 0, reply_timeout: DEFAULT_REPLY_TIMEOUT }
    }
}

/// The result of probing every unit index.
pub struct Census<'a, B> {
    /// Units that answered, in ascending index order
    pub present: Vec<UnitSession<'a, B>>,
    /// Units that stayed silent
    pub absent: Vec<UnitIndex>,
}

/// Finds the units on a bus and keeps them up to date, one request at a time.
pub struct Poller<'a, B> {
    bus: &'a B,
    config: PollConfig,
}

impl<'a, B: CanBus> Poller<'a, B> {
    pub fn new(bus: &'a B, config: PollConfig) -> Self {
        Self { bus, config }
    }

    /// A session for `unit` using this poller's settings.
    pub fn session(&self, unit: UnitIndex) -> UnitSession<'a, B> {
        UnitSession::new(unit, self.bus)
            .with_shunt_mv(self.config.shunt_mv)
            .with_reply_timeout(self.config.reply_timeout)
    }

    /// Probe units 0-15 in order.
    pub async fn probe_all(&self) -> anyhow::Result<Census<'a, B>> {
        let mut census = Census { present: Vec::new(), absent: Vec::new() };
        for unit in UnitIndex::all() {
            let mut session = self.session(unit);
            match session.probe().await? {
                Some(_) => census.present.push(session),
                None => census.absent.push(unit),
            }
        }
        info!(present = census.present.len(), "Probe complete");
        Ok(census)
    }

    /// Update every session in order. Units are not probed again.
    pub async fn update_all(&self, sessions: &mut [UnitSession<'a, B>]) -> anyhow::Result<()> {
        for session in sessions.iter_mut() {
            session.update().await?;
        }
        Ok(())
    }

    /// Probe every unit, then update the ones that answered.
    pub async fn poll(&self) -> anyhow::Result<Census<'a, B>> {
        let mut census = self.probe_all().await?;
        self.update_all(&mut census.present).await?;
        Ok(census)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::scripted::ScriptedBus;
    use crate::frame::Frame;
    use crate::message::FirmwareVersion;
    use crate::unit::UnitState;

    fn unit(index: u8) -> UnitIndex {
        UnitIndex::new(index).unwrap()
    }

    fn bus_with_units_1_and_3() -> ScriptedBus {
        let bus = ScriptedBus::new();
        bus.reply_to(315, vec![Frame::extended(316, &[1, 0, 2, 5, 0, 0, 0, 0])]);
        bus.reply_to(335, vec![Frame::extended(336, &[1, 1, 0, 0, 0, 0, 0, 0])]);
        bus.reply_to(
            310,
            vec![
                Frame::extended(311, &hex::decode("0ce40ce40ce40ce4").unwrap()),
                Frame::extended(314, &[65, 66]),
            ],
        );
        bus.reply_to(330, vec![Frame::extended(333, &hex::decode("0d000d000d000d00").unwrap())]);
        bus
    }

    #[tokio::test]
    async fn test_probe_all() {
        let bus = bus_with_units_1_and_3();
        let poller = Poller::new(&bus, PollConfig::default());

        let census = poller.probe_all().await.unwrap();

        let present: Vec<_> = census.present.iter().map(|s| s.unit()).collect();
        assert_eq!(present, vec![unit(1), unit(3)]);
        assert_eq!(census.absent.len(), 14);
        assert!(!census.absent.contains(&unit(1)));
        assert_eq!(
            census.present[0].state(),
            UnitState::Present(FirmwareVersion::new(0, 2, 5))
        );
        // one version request per unit, ascending
        let sent: Vec<u32> = bus.sent().iter().map(|f| f.id).collect();
        let expected: Vec<u32> = (0..16).map(|u| 305 + u * 10).collect();
        assert_eq!(sent, expected);
    }

    #[tokio::test]
    async fn test_poll_updates_only_present_units() {
        let bus = bus_with_units_1_and_3();
        let config = PollConfig { shunt_mv: 3700, ..PollConfig::default() };
        let poller = Poller::new(&bus, config);

        let census = poller.poll().await.unwrap();

        let queries: Vec<Frame> = bus.sent().into_iter().filter(|f| f.id % 10 == 0).collect();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].id, 310);
        assert_eq!(queries[1].id, 330);
        assert_eq!(queries[0].data, 3700u16.to_be_bytes().to_vec());

        assert_eq!(census.present[0].cell_mv()[..4], [3300; 4]);
        assert_eq!(census.present[0].temperature_c(), [25, 26]);
        assert_eq!(census.present[1].cell_mv()[8..], [3328; 4]);
        assert_eq!(census.present[1].state(), UnitState::Updated);
    }

    #[tokio::test]
    async fn test_poll_propagates_receive_error() {
        // the probe pass takes 17 receives (2 for unit 0, 1 per silent unit),
        // so the bus fails on the first receive of unit 0's update
        let bus = ScriptedBus::failing_recv_after(17);
        bus.reply_to(305, vec![Frame::extended(306, &[1, 0, 2, 5, 0, 0, 0, 0])]);

        let poller = Poller::new(&bus, PollConfig::default());
        let err = poller.poll().await.err().unwrap();

        assert_eq!(err.to_string(), "receive failed");
    }

    #[tokio::test]
    async fn test_probe_all_empty_bus() {
        let bus = ScriptedBus::new();
        let poller = Poller::new(&bus, PollConfig::default());

        let census = poller.poll().await.unwrap();
        assert!(census.present.is_empty());
        assert_eq!(census.absent, UnitIndex::all().collect::<Vec<_>>());
    }
}
