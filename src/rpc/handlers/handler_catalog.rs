// Method handlers, one file per service namespace.

pub mod blockedlist;

pub mod filter;

pub mod moderation;

pub mod settings;
