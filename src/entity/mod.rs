pub mod audit_logs;
pub mod clients;
pub mod invoice_items;
pub mod invoices;
pub mod password_reset_tokens;
pub mod quote_items;
pub mod quotes;
pub mod services;
pub mod users;

pub use audit_logs::Entity as AuditLogs;
pub use clients::Entity as Clients;
pub use invoice_items::Entity as InvoiceItems;
pub use invoices::Entity as Invoices;
pub use password_reset_tokens::Entity as PasswordResetTokens;
pub use quote_items::Entity as QuoteItems;
pub use quotes::Entity as Quotes;
pub use services::Entity as Services;
pub use users::Entity as Users;
