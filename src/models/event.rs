//! Ticket-lifecycle event catalog relayed between clients.

use serde::Serialize;

/// Who receives a relayed event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BroadcastMode {
    /// Every connected client except the sender.
    Others,
    /// Every connected client, the sender included.
    All,
}

/// Cataloged event types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TicketEvent {
    NewTicketCreated,
    NewCommentAdded,
    TicketStartedWorking,
    TicketEscalated,
    TicketAlteredSeverity,
    TicketAlteredRemedyInc,
    TicketAlteredCategoryServiceType,
    TicketClosed,
    TicketCancelled,
    NewFileAttachmentForTicket,
    DeleteFileAttachmentForTicket,
    TicketAlteredActualResolutionDate,
}

/// Wire name and broadcast mode of every cataloged event.
pub const CATALOG: &[(TicketEvent, &str, BroadcastMode)] = &[
    (TicketEvent::NewTicketCreated, "NewTicketCreated", BroadcastMode::Others),
    (TicketEvent::NewCommentAdded, "NewCommentAdded", BroadcastMode::Others),
    (TicketEvent::TicketStartedWorking, "TicketStartedWorking", BroadcastMode::Others),
    (TicketEvent::TicketEscalated, "TicketEscalated", BroadcastMode::Others),
    (TicketEvent::TicketAlteredSeverity, "TicketAlteredSeverity", BroadcastMode::Others),
    (TicketEvent::TicketAlteredRemedyInc, "TicketAlteredRemedyInc", BroadcastMode::Others),
    (
        TicketEvent::TicketAlteredCategoryServiceType,
        "TicketAlteredCategoryServiceType",
        BroadcastMode::Others,
    ),
    (TicketEvent::TicketClosed, "TicketClosed", BroadcastMode::All),
    (TicketEvent::TicketCancelled, "TicketCancelled", BroadcastMode::All),
    (
        TicketEvent::NewFileAttachmentForTicket,
        "NewFileAttachmentForTicket",
        BroadcastMode::All,
    ),
    (
        TicketEvent::DeleteFileAttachmentForTicket,
        "DeleteFileAttachmentForTicket",
        BroadcastMode::All,
    ),
    (
        TicketEvent::TicketAlteredActualResolutionDate,
        "TicketAlteredActualResolutionDate",
        BroadcastMode::All,
    ),
];

impl TicketEvent {
    /// Look up a wire name. Anything outside the catalog is `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        CATALOG
            .iter()
            .find(|(_, wire, _)| *wire == name)
            .map(|(event, _, _)| *event)
    }

    pub fn as_str(&self) -> &'static str {
        self.entry().1
    }

    pub fn mode(&self) -> BroadcastMode {
        self.entry().2
    }

    // CATALOG rows are in declaration order
    fn entry(&self) -> &'static (TicketEvent, &'static str, BroadcastMode) {
        &CATALOG[*self as usize]
    }
}
