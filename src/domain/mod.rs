// Market session calendar
pub mod calendar;

// Council deliberation domain (meetings, messages, signals)
pub mod council;

// Domain-specific error types
pub mod errors;

// Trading events for the event bus
pub mod events;

// Broker-facing market types
pub mod market;

// Port interfaces
pub mod ports;

// Repository traits
pub mod repositories;

// Quant signal domain (indicators, triggers, scan results)
pub mod signals;
