//! User-facing text

pub const WELCOME: &str = "Hi! Welcome to Um. Um is an AI chatbot puzzle game.

Here's how to play:

1. You're presented with a strange situation, which is part of a larger story.
2. You make guesses to better understand the full story. The bot will tell you if your guess is correct, incorrect, or irrelevant to the solution.
3. Once you think you got the full story, submit a solution and the bot will let you know if you got it right!

(Please type `!next` to see an example)";

// Tutorial stages

pub const EXAMPLE: &str = "Here's an a simple example problem:

🪟 Lucky jumper

A person jumped from the windowsill and survived without a scratch completely unharmed.

(Type `!next`)";

pub const ICEBERG: &str = "Unusual, right? Usually jumping from a height would get you injured!

You can think of the full story as an iceberg. You're only presented with a small part, and by making guesses you need to discover what's underneath.

(Type `!next`)";

pub const FIRST_GUESS: &str = "Now try making guesses about the story to get more information. For example, try guessing \"the person had a parachute\".

(Type `The person had a parachute` or something similar)";

pub const POSSIBILITY_TREE: &str = "Turns out the person didn't have a parachute! Now you know a bit more about the story.

There are many possible verions of what happened, but only one of them is right! Small guesses help you eliminate possibilities and move closer to the solution.

(Type `!next`)";

pub const IRRELEVANT: &str = "Sometimes a guess is irrelevant to the answer - it could be right or wrong and it doesn't affect the solution.

For example, try checking if the person was married.

(Type `The person was married` or something similar)";

pub const SUBMIT: &str = "Once you've made a few small guesses and feel like you know the full story, use `!submit` to submit your solution! Make sure your solution includes all important parts that explain what happened.

Try submitting a solution \"The person was caught with a net\".

(Please type `!submit The person was caught with a net` or something similar)";

pub const TUTORIAL_INCORRECT: &str = "Incorrect :( Please try again!";

pub const HINTS: &str = "This one is wrong, but you can try submitting your solution in a second!

If you get stuck, use hints! Hints are meant to be used often in this game. The vast majority of players only solve puzzles with hints - playing without hints is hard mode :)

(Type `!hint`)";

pub const PRIVACY: &str = "One last thing: please agree to our privacy policy before using the bot. Tl;dr: is that to help improve our playing experience and teach the AI how to better check guesses, the bot can collect certain data, including commands you send to the bot, guesses, and submitted solutions.

**We don't collect your name, email, location, or any other identifiable information.** Please don't give the bot any personal information (the bot won't ask for it).

(Type `I agree` to agree to the privacy policy)";

pub const NOW_SOLVE: &str = "Okay great! Now try solving the puzzle and `!submit` once you're ready! If you get stuck, use another hint.";

pub const TUTORIAL_COMPLETE: &str = "Congrats on solving your first puzzle! Now you can type `!puzzles` to see all available puzzles and play them as you want! Good luck!

For a list of commands, type `!help`. If you have any feedback, please send it like this: `!feedback <feedback here>` Thanks!";

// Tutorial nudges

pub const FOLLOW_NEXT: &str = "Please follow the tutorial. Type `!next` to continue.";
pub const TRY_PARACHUTE: &str = "Please try again. Type `The person had a parachute` or something similar.";
pub const TRY_MARRIED: &str = "Please try again. Type `the person was married` or something similar.";
pub const FOLLOW_HINT: &str = "Please follow the tutorial. Type `!hint` to continue.";
pub const AGREE_PRIVACY: &str = "Please type `I agree` to agree to the privacy policy.";
pub const TUTORIAL_HINT_DISABLED: &str = "Hint is not implemented yet! Please don't try again.";
pub const FOLLOW_TUTORIAL: &str = "Please follow tutorial.";

// Tutorial assets

pub const ICEBERG_ASSET: &str = "iceberg.png";
pub const POSSIBILITY_TREE_ASSET: &str = "possibility_tree.png";

// Commands

pub const CORRECT: &str = "Correct, you got it!!!🤩";
pub const INCORRECT: &str = "Incorrect :( Try again!";
pub const NO_SUCH_PUZZLE: &str =
    "No puzzle with this number! Please type `!puzzles` to see available puzzles.";
pub const HINTS_EXHAUSTED: &str = "You have used all your hints!";
pub const NOT_PLAYING: &str =
    "Not playing any puzzle right now. Please select a puzzle from `!puzzles` first!";
pub const SOLUTION_INTRO: &str = "Here is the solution:";
pub const ALREADY_IDLE: &str = "Not playing any puzzle!";
pub const QUIT: &str = "Quit playing puzzle.";
pub const FEEDBACK_THANKS: &str = "Thanks for your feedback!🥰";
pub const INVALID_COMMAND: &str = "Invalid command. Please type `!help` for a list of commands.";
pub const SELECT_PUZZLE_FIRST: &str =
    "Please select puzzle first. Type `!puzzles` to see available puzzles.";
pub const GENERIC_FAILURE: &str = crate::judge::GENERIC_FAILURE;

pub const HELP: &str = "Available commands:
`!puzzles` - Lists all available puzzles
`!play x` - Starts playing puzzle numbered `x`
`!hint` - Gives you a hint
`!submit` - Submits your solution
`!quit` - Quits playing puzzle
`!giveup` - Reveals the solution to the puzzle. Use sparingly :D
`!feedback` - Sends feedback to the developer, e. g. `!feedback I found a bug`. If you'd like a reply, please include your email or Discord username!";

pub fn already_playing(puzzle_id: i64) -> String {
    format!("Already playing puzzle {puzzle_id}! Type `!quit` to quit puzzle.")
}

pub fn hint(text: &str) -> String {
    format!("Here's a hint:\n\n{text}")
}

pub fn puzzle_intro(title: &str, problem: &str) -> String {
    format!("{title}\n\n{problem}")
}

/// Listing of `(id, title)` pairs, already filtered and ordered
pub fn puzzle_list<'a>(puzzles: impl IntoIterator<Item = (i64, &'a str)>) -> String {
    let lines: String = puzzles
        .into_iter()
        .map(|(id, title)| format!("\n{id}: {title}"))
        .collect();
    format!(
        "Here are all the puzzles we have:\n{lines}\n\nTo play a puzzle, type `!play x`, where `x` is the number of the puzzle. For example, `!play 1`."
    )
}
