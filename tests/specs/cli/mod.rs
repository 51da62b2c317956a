mod complete;
mod events;
mod graph;
mod help;
mod lock;
mod recover;
mod spawn;
