mod helpers;
mod ipc;
mod retry;
