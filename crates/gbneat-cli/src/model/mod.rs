pub mod winner;
