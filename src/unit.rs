//! The query/response conversation with one BMS-12 unit.
//!
//! All units share one broadcast bus, so every listener sees every frame. A
//! session sends one request at a time, collects whatever arrives afterwards,
//! and keeps only the frames whose id carries its own unit index.

use std::time::Duration;

use futures_util::stream;
use futures_util::TryStreamExt;
use tracing::{debug, info, trace};

use crate::address::{self, MessageKind, UnitIndex};
use crate::bus::CanBus;
use crate::error::ProtocolError;
use crate::frame::Frame;
use crate::message::{self, FirmwareVersion, Inbound, Reply};
use crate::telemetry::{Telemetry, CELL_COUNT};

/// How long to wait without any frame before considering a reply burst complete
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_millis(100);

/// Where a session is in its conversation with the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitState {
    /// Nothing has been sent yet
    Unqueried,
    /// The last probe got no version reply
    Absent,
    /// The last probe got a version reply
    Present(FirmwareVersion),
    /// A query has been sent and its replies applied
    Updated,
}

/// The replies among `frames` that come from `unit`, in arrival order.
fn replies(unit: UnitIndex, frames: &[Frame]) -> impl Iterator<Item = Reply> + '_ {
    frames.iter().filter_map(move |frame| match Inbound::classify(frame, unit) {
        Inbound::Matched(reply) => Some(reply),
        Inbound::AddressMismatch => {
            trace!(%unit, "Ignoring frame {frame} for another device");
            None
        }
        Inbound::Unrecognized(kind) => {
            trace!(%unit, "Ignoring {kind:?} frame {frame}");
            None
        }
        Inbound::Malformed(err) => {
            debug!(%unit, "Skipping frame {frame}: {err}");
            None
        }
    })
}

/// One BMS-12 unit on a shared bus.
pub struct UnitSession<'a, B> {
    bus: &'a B,
    telemetry: Telemetry,
    state: UnitState,
    reply_timeout: Duration,
}

impl<'a, B: CanBus> UnitSession<'a, B> {
    pub fn new(unit: UnitIndex, bus: &'a B) -> Self {
        Self {
            bus,
            telemetry: Telemetry::new(unit, 0),
            state: UnitState::Unqueried,
            reply_timeout: DEFAULT_REPLY_TIMEOUT,
        }
    }

    pub fn with_shunt_mv(mut self, shunt_mv: u16) -> Self {
        self.telemetry.shunt_mv = shunt_mv;
        self
    }

    pub fn with_reply_timeout(mut self, reply_timeout: Duration) -> Self {
        self.reply_timeout = reply_timeout;
        self
    }

    pub fn unit(&self) -> UnitIndex {
        self.telemetry.unit
    }

    pub fn shunt_mv(&self) -> u16 {
        self.telemetry.shunt_mv
    }

    /// Set a new shunt level in mV. It reaches the unit with the next query.
    pub fn set_shunt_mv(&mut self, shunt_mv: u16) {
        self.telemetry.shunt_mv = shunt_mv;
    }

    pub fn cell_mv(&self) -> &[u16; CELL_COUNT] {
        &self.telemetry.cell_mv
    }

    pub fn temperature_c(&self) -> [i16; 2] {
        self.telemetry.temperature_c
    }

    pub fn version(&self) -> Option<FirmwareVersion> {
        self.telemetry.version
    }

    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    pub fn state(&self) -> UnitState {
        self.state
    }

    /// Send a query, which also sets the unit's shunt level.
    pub async fn send_query(&self) -> anyhow::Result<()> {
        let payload = message::encode_query(self.telemetry.shunt_mv);
        self.send(MessageKind::Query, &payload).await
    }

    /// Ask the unit for its firmware version.
    pub async fn send_version_request(&self) -> anyhow::Result<()> {
        self.send(MessageKind::VersionRequest, &message::VERSION_REQUEST).await
    }

    async fn send(&self, kind: MessageKind, payload: &[u8]) -> anyhow::Result<()> {
        let frame = Frame::extended(address::encode(self.unit(), kind), payload);
        debug!(unit = %self.unit(), "TX: {frame}");
        self.bus.send(&frame).await
    }

    /// Collect every frame received until the bus goes quiet.
    ///
    /// Replies to one request arrive as a burst of frames, and nothing in the
    /// frames says how many to expect. So frames are read until no frame
    /// arrives within the reply timeout, at which point the burst is taken to
    /// be over. A unit that pauses longer than that mid-burst is cut short,
    /// and a late frame from some other unit may be collected too.
    ///
    /// The result may be empty.
    pub async fn collect_replies(&self) -> anyhow::Result<Vec<Frame>> {
        let bus = self.bus;
        let wait = self.reply_timeout;
        let unit = self.unit();
        stream::unfold((), move |()| async move {
            match bus.recv(wait).await {
                Ok(Some(frame)) => Some((Ok(frame), ())),
                Ok(None) => None,
                Err(err) => Some((Err(err), ())),
            }
        })
        .inspect_ok(|frame| trace!(%unit, "RX: {frame}"))
        .try_collect()
        .await
    }

    /// Check whether the unit is on the bus.
    ///
    /// Sends a version request and looks through everything received for a
    /// version reply from this unit. Returns the version if there is one and
    /// `None` if the unit stayed silent, which is not an error.
    pub async fn probe(&mut self) -> anyhow::Result<Option<FirmwareVersion>> {
        self.send_version_request().await?;
        let frames = self.collect_replies().await?;

        let version = replies(self.unit(), &frames).find_map(|reply| match reply {
            Reply::Version(version) => Some(version),
            _ => None,
        });

        match version {
            Some(version) => {
                info!(unit = %self.unit(), %version, "Unit present");
                self.telemetry.version = Some(version);
                self.state = UnitState::Present(version);
            }
            None => {
                debug!(unit = %self.unit(), received = frames.len(), "No version reply");
                self.state = UnitState::Absent;
            }
        }
        Ok(version)
    }

    /// Query the unit and apply every reply it sends back.
    ///
    /// Only the values carried by frames that actually arrived are changed;
    /// everything else keeps its previous value.
    pub async fn update(&mut self) -> anyhow::Result<()> {
        self.send_query().await?;
        let frames = self.collect_replies().await?;

        let mut applied = 0;
        for reply in replies(self.unit(), &frames) {
            self.telemetry.apply(reply);
            applied += 1;
        }
        debug!(unit = %self.unit(), received = frames.len(), applied, "Updated");

        self.state = UnitState::Updated;
        Ok(())
    }

    /// Reboot the unit.
    ///
    /// The reboot message kind is reserved but its payload and any
    /// acknowledgment are unknown, so this sends nothing and always fails with
    /// [`ProtocolError::RebootUnsupported`].
    pub async fn reboot(&self) -> anyhow::Result<()> {
        let id = address::encode(self.unit(), MessageKind::Reboot);
        debug!(unit = %self.unit(), id, "Reboot frame format unknown, not sending");
        Err(ProtocolError::RebootUnsupported(self.unit()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::scripted::ScriptedBus;

    fn unit(index: u8) -> UnitIndex {
        UnitIndex::new(index).unwrap()
    }

    fn cells(id: u32, data: &str) -> Frame {
        Frame::extended(id, &hex::decode(data).unwrap())
    }

    #[tokio::test]
    async fn test_probe_present() {
        let bus = ScriptedBus::new();
        bus.reply_to(315, vec![cells(316, "0100020500000000")]);

        let mut session = UnitSession::new(unit(1), &bus);
        let version = session.probe().await.unwrap();

        assert_eq!(version, Some(FirmwareVersion::new(0, 2, 5)));
        assert_eq!(session.state(), UnitState::Present(FirmwareVersion::new(0, 2, 5)));
        assert_eq!(session.version(), version);
        assert_eq!(bus.sent(), vec![cells(315, "0100000000000000")]);
    }

    #[tokio::test]
    async fn test_probe_absent() {
        let bus = ScriptedBus::new();

        let mut session = UnitSession::new(unit(2), &bus);
        assert_eq!(session.probe().await.unwrap(), None);
        assert_eq!(session.state(), UnitState::Absent);
        assert_eq!(session.version(), None);
    }

    #[tokio::test]
    async fn test_probe_looks_past_stray_first_frame() {
        let bus = ScriptedBus::new();
        bus.inject(cells(341, "0ce40ce40ce40ce4"));
        bus.reply_to(325, vec![cells(326, "0101000000000000")]);

        let mut session = UnitSession::new(unit(2), &bus);
        assert_eq!(session.probe().await.unwrap(), Some(FirmwareVersion::new(1, 0, 0)));
    }

    #[tokio::test]
    async fn test_probe_ignores_other_units_version() {
        let bus = ScriptedBus::new();
        bus.reply_to(325, vec![cells(336, "0101000000000000")]);

        let mut session = UnitSession::new(unit(2), &bus);
        assert_eq!(session.probe().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_probe_nack_is_absent() {
        let bus = ScriptedBus::new();
        bus.reply_to(325, vec![cells(326, "0001020300000000")]);

        let mut session = UnitSession::new(unit(2), &bus);
        assert_eq!(session.probe().await.unwrap(), None);
        assert_eq!(session.state(), UnitState::Absent);
    }

    #[tokio::test]
    async fn test_update_full_burst() {
        let bus = ScriptedBus::new();
        bus.reply_to(
            330,
            vec![
                cells(331, "0ce40ce50ce60ce7"),
                cells(332, "0ce80ce90cea0ceb"),
                cells(333, "0cec0ced0cee0cef"),
                Frame::extended(334, &[62, 63]),
            ],
        );

        let mut session = UnitSession::new(unit(3), &bus);
        session.update().await.unwrap();

        let expected: Vec<u16> = (3300..3312).collect();
        assert_eq!(session.cell_mv().to_vec(), expected);
        assert_eq!(session.temperature_c(), [22, 23]);
        assert_eq!(session.state(), UnitState::Updated);
    }

    #[tokio::test]
    async fn test_update_partial_burst_keeps_missing_block() {
        let bus = ScriptedBus::new();
        let full = vec![
            cells(331, "0001000100010001"),
            cells(332, "0002000200020002"),
            cells(333, "0003000300030003"),
        ];
        bus.reply_to(330, full);
        bus.reply_to(330, vec![cells(331, "0ce40ce40ce40ce4"), cells(333, "0ce50ce50ce50ce5")]);

        let mut session = UnitSession::new(unit(3), &bus);
        session.update().await.unwrap();
        session.update().await.unwrap();

        assert_eq!(
            session.cell_mv(),
            &[3300, 3300, 3300, 3300, 2, 2, 2, 2, 3301, 3301, 3301, 3301]
        );
        assert_eq!(session.temperature_c(), [0, 0]);
    }

    #[tokio::test]
    async fn test_update_discards_cross_talk() {
        let bus = ScriptedBus::new();
        bus.reply_to(350, vec![cells(341, "0fa00fa00fa00fa0"), cells(351, "0ce40ce40ce40ce4")]);
        bus.reply_to(340, vec![cells(342, "0d000d000d000d00")]);

        let mut unit5 = UnitSession::new(unit(5), &bus);
        let mut unit4 = UnitSession::new(unit(4), &bus);
        unit5.update().await.unwrap();
        unit4.update().await.unwrap();

        assert_eq!(unit5.cell_mv()[..4], [3300; 4]);
        assert_eq!(unit5.cell_mv()[4..], [0; 8]);
        assert_eq!(unit4.cell_mv()[..4], [0; 4]);
        assert_eq!(unit4.cell_mv()[4..8], [3328; 4]);
    }

    #[tokio::test]
    async fn test_update_skips_malformed_and_unknown() {
        let bus = ScriptedBus::new();
        bus.reply_to(
            360,
            vec![
                cells(361, "0ce40ce40ce4"),
                Frame::extended(367, &[1, 2]),
                Frame::extended(364, &[50, 51]),
            ],
        );

        let mut session = UnitSession::new(unit(6), &bus);
        session.update().await.unwrap();

        assert_eq!(session.cell_mv(), &[0; CELL_COUNT]);
        assert_eq!(session.temperature_c(), [10, 11]);
    }

    #[tokio::test]
    async fn test_update_version_reply() {
        let bus = ScriptedBus::new();
        bus.reply_to(370, vec![cells(376, "0102030400000000")]);

        let mut session = UnitSession::new(unit(7), &bus);
        session.update().await.unwrap();
        assert_eq!(session.version(), Some(FirmwareVersion::new(2, 3, 4)));
    }

    #[tokio::test]
    async fn test_update_sends_shunt_level() {
        let bus = ScriptedBus::new();

        let mut session = UnitSession::new(unit(1), &bus).with_shunt_mv(3800);
        session.update().await.unwrap();
        session.set_shunt_mv(0);
        session.update().await.unwrap();

        let sent = bus.sent();
        assert_eq!(sent[0], cells(310, "0ed8"));
        assert_eq!(sent[1], cells(310, "0000"));
        assert!(sent[0].extended);
    }

    #[tokio::test]
    async fn test_reboot_sends_nothing() {
        let bus = ScriptedBus::new();
        let session = UnitSession::new(unit(9), &bus);

        let err = session.reboot().await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<ProtocolError>(),
            Some(&ProtocolError::RebootUnsupported(unit(9)))
        );
        assert!(bus.sent().is_empty());
    }

    #[tokio::test]
    async fn test_transport_error_propagates() {
        let bus = ScriptedBus::failing();
        let mut session = UnitSession::new(unit(0), &bus);

        assert!(session.probe().await.is_err());
        assert_eq!(session.state(), UnitState::Unqueried);
    }

    #[tokio::test]
    async fn test_receive_error_mid_burst_leaves_telemetry() {
        let bus = ScriptedBus::failing_recv_after(1);
        bus.reply_to(
            380,
            vec![cells(381, "0ce40ce40ce40ce4"), Frame::extended(384, &[62, 63])],
        );

        let mut session = UnitSession::new(unit(8), &bus);
        let err = session.update().await.unwrap_err();

        assert_eq!(err.to_string(), "receive failed");
        assert_eq!(session.cell_mv(), &[0; CELL_COUNT]);
        assert_eq!(session.temperature_c(), [0, 0]);
        assert_eq!(session.state(), UnitState::Unqueried);
    }
}
