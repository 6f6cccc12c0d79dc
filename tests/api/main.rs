mod cli;
mod helpers;
mod wordcount;
