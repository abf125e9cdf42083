pub mod dhcp;
pub mod link_local;
pub mod listener;
pub mod run;
