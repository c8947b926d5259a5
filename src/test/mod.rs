mod election;
mod e2e;
mod flood;
mod lsa;
mod lsdb;
mod overlay;
mod packet;
mod routes;
mod support;
