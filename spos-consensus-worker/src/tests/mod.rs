// Copyright (c) 2022 MASSA LABS <info@massa.net>

mod chronology;
mod clock;
mod phases;
mod tools;
