pub mod paradigms;
