pub mod breakdown_service;
pub mod due_service;
pub mod ledger_service;
pub mod slot_group_service;
pub mod slot_record_service;

pub use breakdown_service::{BreakdownService, LineItem, LineItemKind};
pub use due_service::{DueService, DueSummary, OneOffComponent, RecurringComponent};
pub use ledger_service::{
    BulkOutcome, BulkRequest, BulkStatus, PaymentLedgerService, PaymentOverview, PaymentReceipt,
    PaymentRequest,
};
pub use slot_group_service::{SlotGroup, SlotGroupService};
pub use slot_record_service::{EnsureReport, SlotRecordService, SlotStatus};
